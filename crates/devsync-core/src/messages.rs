//! Persisted message records and the storage boundary the REST handlers use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::ids::{RoomId, UserId};

/// A stored one-to-one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    /// Row identifier.
    pub id: i64,
    /// Author.
    pub sender_id: UserId,
    /// Recipient.
    pub receiver_id: UserId,
    /// Text body.
    pub content: String,
    /// Whether the recipient has read it.
    pub read: bool,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
}

/// A stored group-chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    /// Row identifier.
    pub id: i64,
    /// Room the message was posted to.
    pub chat_room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name at the time of posting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Text body.
    pub content: String,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator for the REST write handlers.
///
/// The hub never calls this; handlers persist first and only then hand an
/// envelope to the hub for best-effort delivery.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a direct message. Fails with [`StoreError::NotFound`] when the
    /// receiver does not exist.
    async fn save_direct(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
    ) -> Result<DirectMessage, StoreError>;

    /// Store a group message. Fails with [`StoreError::NotFound`] when the
    /// room does not exist.
    async fn save_group(
        &self,
        room: RoomId,
        sender: UserId,
        content: &str,
    ) -> Result<GroupMessage, StoreError>;

    /// Whether `user` currently belongs to `room`.
    async fn is_member(&self, room: RoomId, user: UserId) -> Result<bool, StoreError>;

    /// Display name of `user`, if the user exists.
    async fn display_name(&self, user: UserId) -> Result<Option<String>, StoreError>;
}
