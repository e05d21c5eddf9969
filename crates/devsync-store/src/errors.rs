//! Error types for the storage layer.
//!
//! [`DbError`] is returned by every repository and pool operation. It folds
//! into the shared [`StoreError`] at the collaborator-trait boundary, where
//! only "not found" is meaningful to callers.

use devsync_core::{RoomId, StoreError, UserId};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// Referenced chat room does not exist.
    #[error("chat room not found: {0}")]
    RoomNotFound(RoomId),

    /// Internal error (e.g. a blocking task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UserNotFound(id) => Self::NotFound(format!("user {id}")),
            DbError::RoomNotFound(id) => Self::NotFound(format!("chat room {id}")),
            other => Self::Backend(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
