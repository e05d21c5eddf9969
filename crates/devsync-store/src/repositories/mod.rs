//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! parameter, so every operation is a plain function of connection and input.

pub mod messages;
pub mod rooms;
pub mod users;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Convert a numeric identifier into `SQLite`'s signed integer.
pub(crate) fn sql_id(raw: u64) -> rusqlite::Result<i64> {
    i64::try_from(raw).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Read a numeric identifier column.
pub(crate) fn column_id(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn column_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Current time as stored in timestamp columns.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    use crate::migrations::run_migrations;

    /// Fresh migrated in-memory database.
    pub fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }
}
