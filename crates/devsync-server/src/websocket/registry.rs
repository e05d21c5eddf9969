//! The hub: one registry entry per user, plus routing to users and rooms.
//!
//! The map is guarded by a single `parking_lot::RwLock`. Mutations take the
//! write lock, lookups take the read lock, and the guard is always dropped
//! before any frame is enqueued or any `.await`, so routing never waits on a
//! socket and never holds the lock across the membership query.

use std::collections::HashMap;
use std::sync::Arc;

use devsync_core::{CodecError, Envelope, Frame, RoomId, RoomMembership, Route, UserId};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::connection::{CloseReason, Connection, Enqueue};
use crate::metrics::{
    HUB_EVICTIONS_TOTAL, HUB_FRAMES_DELIVERED_TOTAL, HUB_FRAMES_OFFLINE_TOTAL,
    HUB_MEMBERSHIP_ERRORS_TOTAL, WS_CONNECTIONS_ACTIVE,
};

/// Outcome of delivering one frame to one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was queued on the user's connection.
    Delivered,
    /// The user has no live connection; the frame was dropped.
    Offline,
    /// The user's queue was full; the connection was evicted.
    Evicted,
}

/// Tally of a room fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoomDelivery {
    /// Members whose queue accepted the frame.
    pub delivered: usize,
    /// Members with no live connection.
    pub offline: usize,
    /// Members evicted for a full queue.
    pub evicted: usize,
}

impl RoomDelivery {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Offline => self.offline += 1,
            Delivery::Evicted => self.evicted += 1,
        }
    }
}

/// Outcome of [`Hub::dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Routed to a single user.
    User(Delivery),
    /// Fanned out to a room.
    Room(RoomDelivery),
}

/// Registry of live connections and router for outbound frames.
pub struct Hub {
    connections: RwLock<HashMap<UserId, Arc<Connection>>>,
    membership: Arc<dyn RoomMembership>,
}

impl Hub {
    /// Create an empty hub that resolves rooms through `membership`.
    pub fn new(membership: Arc<dyn RoomMembership>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            membership,
        }
    }

    /// Make `conn` the live connection for its user.
    ///
    /// Any connection previously on file for that user is closed and returned.
    /// Once this returns, routing calls see `conn`.
    pub fn register(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let (previous, active) = {
            let mut map = self.connections.write();
            let previous = map.insert(conn.user_id, conn.clone());
            (previous, map.len())
        };
        record_active(active);

        let previous = previous.filter(|old| !Arc::ptr_eq(old, &conn))?;
        let _ = previous.close(CloseReason::Replaced);
        counter!(HUB_EVICTIONS_TOTAL, "reason" => CloseReason::Replaced.as_str()).increment(1);
        info!(
            user_id = %conn.user_id,
            conn_id = %conn.id,
            replaced = %previous.id,
            "connection replaced"
        );
        Some(previous)
    }

    /// Remove `conn` if it is still the connection on file for its user.
    ///
    /// Returns whether an entry was removed. Calling this for a connection
    /// that was already replaced or removed is a no-op.
    pub fn unregister(&self, conn: &Connection) -> bool {
        let (removed, active) = {
            let mut map = self.connections.write();
            let current = map.get(&conn.user_id).is_some_and(|c| c.id == conn.id);
            if current {
                let _ = map.remove(&conn.user_id);
            }
            (current, map.len())
        };
        if removed {
            record_active(active);
            let _ = conn.close(CloseReason::ClientGone);
            debug!(user_id = %conn.user_id, conn_id = %conn.id, "connection unregistered");
        }
        removed
    }

    /// Deliver a frame to `target`'s live connection, if any.
    ///
    /// Never blocks and never fails: an offline target drops the frame, and
    /// a full queue evicts the target's connection.
    pub fn route_to_user(&self, target: UserId, frame: &Frame) -> Delivery {
        let conn = self.connections.read().get(&target).cloned();
        let Some(conn) = conn else {
            counter!(HUB_FRAMES_OFFLINE_TOTAL).increment(1);
            return Delivery::Offline;
        };

        match conn.enqueue(frame.clone()) {
            Enqueue::Queued => {
                counter!(HUB_FRAMES_DELIVERED_TOTAL).increment(1);
                Delivery::Delivered
            }
            Enqueue::Full => {
                let _ = conn.close(CloseReason::SlowConsumer);
                let _ = self.unregister(&conn);
                counter!(HUB_EVICTIONS_TOTAL, "reason" => CloseReason::SlowConsumer.as_str())
                    .increment(1);
                warn!(
                    user_id = %target,
                    conn_id = %conn.id,
                    dropped = conn.drop_count(),
                    "outbound queue full, evicting connection"
                );
                Delivery::Evicted
            }
            Enqueue::Closed => {
                let _ = self.unregister(&conn);
                counter!(HUB_FRAMES_OFFLINE_TOTAL).increment(1);
                debug!(user_id = %target, conn_id = %conn.id, "stale connection removed");
                Delivery::Offline
            }
        }
    }

    /// Deliver a frame to every current member of `room` except `sender`.
    ///
    /// Members are looked up on every call. A membership lookup failure is
    /// logged and delivers nothing.
    pub async fn route_to_room(&self, room: RoomId, sender: UserId, frame: &Frame) -> RoomDelivery {
        let members = match self.membership.members(room).await {
            Ok(members) => members,
            Err(e) => {
                counter!(HUB_MEMBERSHIP_ERRORS_TOTAL).increment(1);
                warn!(room_id = %room, error = %e, "room membership lookup failed");
                return RoomDelivery::default();
            }
        };

        let mut tally = RoomDelivery::default();
        for member in members.into_iter().filter(|m| *m != sender) {
            tally.record(self.route_to_user(member, frame));
        }
        debug!(
            room_id = %room,
            sender_id = %sender,
            delivered = tally.delivered,
            offline = tally.offline,
            evicted = tally.evicted,
            "room fan-out"
        );
        tally
    }

    /// Encode `envelope` once and route it by its destination.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<Dispatch, CodecError> {
        let route = envelope.route()?;
        let frame = envelope.encode()?;
        Ok(match route {
            Route::User(target) => Dispatch::User(self.route_to_user(target, &frame)),
            Route::Room(room) => {
                Dispatch::Room(self.route_to_room(room, envelope.sender_id, &frame).await)
            }
        })
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether `user` has a registered connection.
    pub fn is_online(&self, user: UserId) -> bool {
        self.connections.read().contains_key(&user)
    }

    /// The connection on file for `user`.
    pub fn connection(&self, user: UserId) -> Option<Arc<Connection>> {
        self.connections.read().get(&user).cloned()
    }

    /// Close every registered connection. Sessions unregister themselves as
    /// their pumps wind down.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let conns: Vec<_> = self.connections.read().values().cloned().collect();
        for conn in &conns {
            let _ = conn.close(reason);
        }
        if !conns.is_empty() {
            info!(count = conns.len(), %reason, "closed all connections");
        }
        conns.len()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(count: usize) {
    gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
}
