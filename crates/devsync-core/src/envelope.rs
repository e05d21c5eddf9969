//! Wire envelope exchanged with connected clients, and its JSON codec.
//!
//! Every frame is one JSON object tagged by `type`:
//!
//! ```json
//! {"type":"group_message","sender_id":1,"room_id":4,"content":"hi","sender_name":"alice"}
//! ```
//!
//! Optional fields are omitted when absent, and fields are always written in
//! declaration order, so encoding the same envelope twice yields identical
//! bytes. Encoded frames are reference-counted ([`Frame`]) so a room fan-out
//! serializes once and shares the payload across every recipient queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::ids::{RoomId, UserId};

/// One serialized frame, shared between recipient queues.
pub type Frame = Arc<str>;

/// Discriminator carried in the `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    /// One-to-one message between two users.
    DirectMessage,
    /// Message posted to a group-chat room.
    GroupMessage,
    /// Server-originated notice.
    System,
    /// Client-originated chat payload relayed to a single receiver.
    Chat,
}

impl EnvelopeKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::GroupMessage => "group_message",
            Self::System => "system",
            Self::Chat => "chat",
        }
    }
}

/// Where an envelope should be delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Deliver to one user.
    User(UserId),
    /// Fan out to the members of a room.
    Room(RoomId),
}

/// Normalized in-memory form of one chat frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Frame kind (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Originating user. Inbound values are ignored and overwritten with the
    /// connection's own identity.
    #[serde(default)]
    pub sender_id: UserId,
    /// Target user for direct and chat frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    /// Target room for group frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Text payload.
    pub content: String,
    /// Sender's display name, when the server knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl Envelope {
    /// A direct message from `sender` to `receiver`.
    pub fn direct(sender: UserId, receiver: UserId, content: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::DirectMessage,
            sender_id: sender,
            receiver_id: Some(receiver),
            room_id: None,
            content: content.into(),
            sender_name: None,
        }
    }

    /// A group message from `sender` to everyone in `room`.
    pub fn group(
        room: RoomId,
        sender: UserId,
        content: impl Into<String>,
        sender_name: Option<String>,
    ) -> Self {
        Self {
            kind: EnvelopeKind::GroupMessage,
            sender_id: sender,
            receiver_id: None,
            room_id: Some(room),
            content: content.into(),
            sender_name,
        }
    }

    /// A server notice addressed to `receiver`. The sender is the reserved id 0.
    pub fn system(receiver: UserId, content: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::System,
            sender_id: UserId::default(),
            receiver_id: Some(receiver),
            room_id: None,
            content: content.into(),
            sender_name: None,
        }
    }

    /// Attach the sender's display name.
    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode into a shareable frame.
    pub fn encode(&self) -> Result<Frame, CodecError> {
        let json = serde_json::to_string(self)?;
        Ok(Frame::from(json))
    }

    /// Classify the destination of this envelope.
    pub fn route(&self) -> Result<Route, CodecError> {
        match self.kind {
            EnvelopeKind::DirectMessage | EnvelopeKind::Chat | EnvelopeKind::System => self
                .receiver_id
                .map(Route::User)
                .ok_or(CodecError::Unroutable {
                    kind: self.kind.as_str(),
                    reason: "missing receiver_id",
                }),
            EnvelopeKind::GroupMessage => {
                self.room_id
                    .map(Route::Room)
                    .ok_or(CodecError::Unroutable {
                        kind: self.kind.as_str(),
                        reason: "missing room_id",
                    })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
