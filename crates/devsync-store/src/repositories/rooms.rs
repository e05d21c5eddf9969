//! Chat room repository over `chat_rooms` and `chat_room_members`.

use devsync_core::{RoomId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use super::{column_id, now, sql_id};
use crate::errors::{DbError, Result};

/// Chat room repository, stateless.
pub struct RoomRepo;

impl RoomRepo {
    /// Create a room owned by `owner`. The owner becomes its first member.
    pub fn create(
        conn: &Connection,
        name: &str,
        description: &str,
        owner: UserId,
    ) -> Result<RoomId> {
        let tx = conn.unchecked_transaction()?;
        let ts = now().to_rfc3339();
        let _ = tx.execute(
            "INSERT INTO chat_rooms (name, description, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, description, sql_id(owner.get())?, ts],
        )?;
        let id = RoomId::new(tx.query_row("SELECT last_insert_rowid()", [], |row| {
            column_id(row, 0)
        })?);
        let _ = tx.execute(
            "INSERT INTO chat_room_members (chat_room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![sql_id(id.get())?, sql_id(owner.get())?, ts],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Whether a room exists.
    pub fn exists(conn: &Connection, room: RoomId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chat_rooms WHERE id = ?1",
                params![sql_id(room.get())?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Add `user` to `room`. Returns `false` if already a member.
    pub fn add_member(conn: &Connection, room: RoomId, user: UserId) -> Result<bool> {
        if !Self::exists(conn, room)? {
            return Err(DbError::RoomNotFound(room));
        }
        let changed = conn.execute(
            "INSERT OR IGNORE INTO chat_room_members (chat_room_id, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
            params![sql_id(room.get())?, sql_id(user.get())?, now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Remove `user` from `room`. Returns whether a membership was removed.
    pub fn remove_member(conn: &Connection, room: RoomId, user: UserId) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM chat_room_members WHERE chat_room_id = ?1 AND user_id = ?2",
            params![sql_id(room.get())?, sql_id(user.get())?],
        )?;
        Ok(changed > 0)
    }

    /// Current members of `room`, ordered by user id. Unknown rooms are empty.
    pub fn members(conn: &Connection, room: RoomId) -> Result<Vec<UserId>> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM chat_room_members WHERE chat_room_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt
            .query_map(params![sql_id(room.get())?], |row| {
                column_id(row, 0).map(UserId::new)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether `user` belongs to `room`.
    pub fn is_member(conn: &Connection, room: RoomId, user: UserId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chat_room_members WHERE chat_room_id = ?1 AND user_id = ?2",
                params![sql_id(room.get())?, sql_id(user.get())?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
