//! User repository over the `users` table.
//!
//! Accounts are owned by the account service; this table only mirrors the
//! id and display name the hub needs.

use devsync_core::UserId;
use rusqlite::{Connection, OptionalExtension, params};

use super::{column_id, now, sql_id};
use crate::errors::Result;

/// User repository, stateless.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user and return its id.
    pub fn create(conn: &Connection, name: &str) -> Result<UserId> {
        let _ = conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
            params![name, now().to_rfc3339()],
        )?;
        let id = conn.query_row("SELECT last_insert_rowid()", [], |row| column_id(row, 0))?;
        Ok(UserId::new(id))
    }

    /// Display name of a user, or `None` if the user does not exist.
    pub fn display_name(conn: &Connection, id: UserId) -> Result<Option<String>> {
        let name = conn
            .query_row(
                "SELECT name FROM users WHERE id = ?1",
                params![sql_id(id.get())?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// Whether a user exists.
    pub fn exists(conn: &Connection, id: UserId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![sql_id(id.get())?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
