//! [`SqliteStore`]: the `SQLite` implementation of the hub's collaborators.

use async_trait::async_trait;
use devsync_core::{
    DirectMessage, GroupMessage, MessageStore, RoomId, RoomMembership, StoreError, UserId,
};
use rusqlite::Connection;
use tracing::info;

use crate::connection::{ConnectionConfig, ConnectionPool, open_pool};
use crate::errors::{DbError, Result};
use crate::migrations::run_migrations;
use crate::repositories::messages::MessageRepo;
use crate::repositories::rooms::RoomRepo;
use crate::repositories::users::UserRepo;

/// Path that selects an in-process database.
pub const IN_MEMORY: &str = ":memory:";

/// Pooled `SQLite` store. Cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("max_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply pending migrations.
    /// [`IN_MEMORY`] opens a private in-process database.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = open_pool(path, config)?;
        let applied = run_migrations(&*pool.get()?)?;
        info!(path, applied, "store opened");
        Ok(Self { pool })
    }

    /// In-memory store with the schema applied.
    pub fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY, &ConnectionConfig::default())
    }

    /// Underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run `f` against a pooled connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| DbError::Internal(format!("blocking task failed: {e}")))?
    }

    /// Register a user mirror row.
    pub async fn create_user(&self, name: &str) -> Result<UserId> {
        let name = name.to_string();
        self.run(move |conn| UserRepo::create(conn, &name)).await
    }

    /// Create a room owned (and joined) by `owner`.
    pub async fn create_room(&self, name: &str, owner: UserId) -> Result<RoomId> {
        let name = name.to_string();
        self.run(move |conn| {
            if !UserRepo::exists(conn, owner)? {
                return Err(DbError::UserNotFound(owner));
            }
            RoomRepo::create(conn, &name, "", owner)
        })
        .await
    }

    /// Add a member to a room. Returns `false` if already a member.
    pub async fn join_room(&self, room: RoomId, user: UserId) -> Result<bool> {
        self.run(move |conn| {
            if !UserRepo::exists(conn, user)? {
                return Err(DbError::UserNotFound(user));
            }
            RoomRepo::add_member(conn, room, user)
        })
        .await
    }

    /// Remove a member from a room. Returns whether anything changed.
    pub async fn leave_room(&self, room: RoomId, user: UserId) -> Result<bool> {
        self.run(move |conn| RoomRepo::remove_member(conn, room, user))
            .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save_direct(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
    ) -> std::result::Result<DirectMessage, StoreError> {
        let content = content.to_string();
        let msg = self
            .run(move |conn| {
                if !UserRepo::exists(conn, receiver)? {
                    return Err(DbError::UserNotFound(receiver));
                }
                MessageRepo::insert_direct(conn, sender, receiver, &content)
            })
            .await?;
        Ok(msg)
    }

    async fn save_group(
        &self,
        room: RoomId,
        sender: UserId,
        content: &str,
    ) -> std::result::Result<GroupMessage, StoreError> {
        let content = content.to_string();
        let msg = self
            .run(move |conn| {
                if !RoomRepo::exists(conn, room)? {
                    return Err(DbError::RoomNotFound(room));
                }
                MessageRepo::insert_group(conn, room, sender, &content)
            })
            .await?;
        Ok(msg)
    }

    async fn is_member(&self, room: RoomId, user: UserId) -> std::result::Result<bool, StoreError> {
        Ok(self
            .run(move |conn| RoomRepo::is_member(conn, room, user))
            .await?)
    }

    async fn display_name(&self, user: UserId) -> std::result::Result<Option<String>, StoreError> {
        Ok(self
            .run(move |conn| UserRepo::display_name(conn, user))
            .await?)
    }
}

#[async_trait]
impl RoomMembership for SqliteStore {
    async fn members(&self, room: RoomId) -> std::result::Result<Vec<UserId>, StoreError> {
        Ok(self.run(move |conn| RoomRepo::members(conn, room)).await?)
    }
}
