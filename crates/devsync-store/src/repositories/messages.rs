//! Message repository over `messages` (direct) and `group_messages`.

use devsync_core::{DirectMessage, GroupMessage, RoomId, UserId};
use rusqlite::{Connection, params};

use super::{column_id, column_time, now, sql_id};
use crate::errors::Result;

/// Message repository, stateless.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a direct message. Referential checks are the caller's job.
    pub fn insert_direct(
        conn: &Connection,
        sender: UserId,
        receiver: UserId,
        content: &str,
    ) -> Result<DirectMessage> {
        let created_at = now();
        let _ = conn.execute(
            "INSERT INTO messages (sender_id, receiver_id, content, read, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                sql_id(sender.get())?,
                sql_id(receiver.get())?,
                content,
                created_at.to_rfc3339()
            ],
        )?;
        Ok(DirectMessage {
            id: conn.last_insert_rowid(),
            sender_id: sender,
            receiver_id: receiver,
            content: content.to_string(),
            read: false,
            created_at,
        })
    }

    /// Insert a group message, filling in the sender's current display name.
    pub fn insert_group(
        conn: &Connection,
        room: RoomId,
        sender: UserId,
        content: &str,
    ) -> Result<GroupMessage> {
        let _ = conn.execute(
            "INSERT INTO group_messages (chat_room_id, sender_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sql_id(room.get())?,
                sql_id(sender.get())?,
                content,
                now().to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        let msg = conn.query_row(
            "SELECT g.id, g.chat_room_id, g.sender_id, u.name, g.content, g.created_at
             FROM group_messages g LEFT JOIN users u ON u.id = g.sender_id
             WHERE g.id = ?1",
            params![id],
            Self::map_group,
        )?;
        Ok(msg)
    }

    /// Direct messages exchanged between two users, oldest first.
    pub fn conversation(
        conn: &Connection,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessage>> {
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, content, read, created_at FROM (
                 SELECT * FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY id DESC LIMIT ?3
             ) ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![sql_id(a.get())?, sql_id(b.get())?, limit],
                Self::map_direct,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Group messages posted to `room`, oldest first.
    pub fn room_history(conn: &Connection, room: RoomId, limit: u32) -> Result<Vec<GroupMessage>> {
        let mut stmt = conn.prepare(
            "SELECT id, chat_room_id, sender_id, name, content, created_at FROM (
                 SELECT g.id, g.chat_room_id, g.sender_id, u.name, g.content, g.created_at
                 FROM group_messages g LEFT JOIN users u ON u.id = g.sender_id
                 WHERE g.chat_room_id = ?1
                 ORDER BY g.id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![sql_id(room.get())?, limit], Self::map_group)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_direct(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectMessage> {
        Ok(DirectMessage {
            id: row.get(0)?,
            sender_id: UserId::new(column_id(row, 1)?),
            receiver_id: UserId::new(column_id(row, 2)?),
            content: row.get(3)?,
            read: row.get(4)?,
            created_at: column_time(row, 5)?,
        })
    }

    fn map_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMessage> {
        Ok(GroupMessage {
            id: row.get(0)?,
            chat_room_id: RoomId::new(column_id(row, 1)?),
            sender_id: UserId::new(column_id(row, 2)?),
            sender_name: row.get(3)?,
            content: row.get(4)?,
            created_at: column_time(row, 5)?,
        })
    }
}
