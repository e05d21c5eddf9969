//! Inbound frame handling: decode, stamp the sender, route.

use devsync_core::{Envelope, EnvelopeKind};
use metrics::counter;
use tracing::debug;

use super::connection::Connection;
use super::registry::{Delivery, Hub};
use crate::metrics::WS_MALFORMED_FRAMES_TOTAL;

/// What happened to one inbound text frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Routed to the receiver.
    Routed(Delivery),
    /// Decoded but not routable from a client; the label says why.
    Dropped(&'static str),
    /// Not a valid envelope.
    Malformed,
}

/// Handle one inbound text frame from `conn`.
///
/// The sender is always the connection's authenticated user, whatever the
/// frame claims. Clients may only address single users; group and system
/// frames go through the REST API and the server respectively.
pub fn handle_text(text: &str, conn: &Connection, hub: &Hub) -> Inbound {
    let mut envelope = match Envelope::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            counter!(WS_MALFORMED_FRAMES_TOTAL).increment(1);
            debug!(user_id = %conn.user_id, error = %e, "dropping malformed frame");
            return Inbound::Malformed;
        }
    };

    envelope.sender_id = conn.user_id;
    envelope.sender_name = None;

    let outcome = match (envelope.kind, envelope.receiver_id) {
        (EnvelopeKind::GroupMessage | EnvelopeKind::System, _) => Err("kind not accepted from clients"),
        (_, None) => Err("missing receiver_id"),
        (_, Some(target)) if target == conn.user_id => Err("addressed to self"),
        (_, Some(target)) => Ok(target),
    };
    let target = match outcome {
        Ok(target) => target,
        Err(reason) => {
            debug!(user_id = %conn.user_id, kind = envelope.kind.as_str(), reason, "dropping inbound frame");
            return Inbound::Dropped(reason);
        }
    };

    match envelope.encode() {
        Ok(frame) => Inbound::Routed(hub.route_to_user(target, &frame)),
        Err(e) => {
            debug!(user_id = %conn.user_id, error = %e, "failed to re-encode inbound frame");
            Inbound::Malformed
        }
    }
}
