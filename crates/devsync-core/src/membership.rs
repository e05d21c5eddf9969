//! Room membership boundary.
//!
//! The hub asks a [`RoomMembership`] provider for a room's members at
//! broadcast time and never caches the answer, so joins and leaves show up
//! on the next fan-out without any invalidation.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::StoreError;
use crate::ids::{RoomId, UserId};

/// Source of truth for which users belong to a room.
#[async_trait]
pub trait RoomMembership: Send + Sync {
    /// Current members of `room`. An unknown room has no members.
    async fn members(&self, room: RoomId) -> Result<Vec<UserId>, StoreError>;
}

/// In-memory membership table.
#[derive(Debug, Default)]
pub struct StaticRoomMembership {
    rooms: RwLock<HashMap<RoomId, BTreeSet<UserId>>>,
}

impl StaticRoomMembership {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(room, members)` pairs.
    pub fn with_rooms<I, M>(rooms: I) -> Self
    where
        I: IntoIterator<Item = (RoomId, M)>,
        M: IntoIterator<Item = UserId>,
    {
        let table = rooms
            .into_iter()
            .map(|(room, members)| (room, members.into_iter().collect()))
            .collect();
        Self {
            rooms: RwLock::new(table),
        }
    }

    /// Add `user` to `room`. Returns `false` if already a member.
    pub fn join(&self, room: RoomId, user: UserId) -> bool {
        self.rooms.write().entry(room).or_default().insert(user)
    }

    /// Remove `user` from `room`. Returns `false` if not a member.
    pub fn leave(&self, room: RoomId, user: UserId) -> bool {
        let mut rooms = self.rooms.write();
        let Some(members) = rooms.get_mut(&room) else {
            return false;
        };
        let removed = members.remove(&user);
        if members.is_empty() {
            let _ = rooms.remove(&room);
        }
        removed
    }
}

#[async_trait]
impl RoomMembership for StaticRoomMembership {
    async fn members(&self, room: RoomId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .rooms
            .read()
            .get(&room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }
}
