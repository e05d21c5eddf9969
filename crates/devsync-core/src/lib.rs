//! # devsync-core
//!
//! Shared vocabulary for the devsync real-time hub.
//!
//! - **Identities**: `UserId`, `RoomId` (numeric, issued by the account system)
//!   and `ConnectionId` (UUID v7, one per live socket)
//! - **Envelope**: the wire frame exchanged with clients and its JSON codec
//! - **Messages**: persisted direct and group message records
//! - **Collaborators**: `RoomMembership` and `MessageStore` traits the hub and
//!   REST handlers depend on, plus an in-memory membership provider
//! - **Errors**: `CodecError` and `StoreError` via `thiserror`

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod membership;
pub mod messages;

pub use envelope::{Envelope, EnvelopeKind, Frame, Route};
pub use errors::{CodecError, StoreError};
pub use ids::{ConnectionId, RoomId, UserId};
pub use membership::{RoomMembership, StaticRoomMembership};
pub use messages::{DirectMessage, GroupMessage, MessageStore};
