//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.
//!
//! Each session runs two pumps that share nothing but the outbound queue
//! and the connection's close signal:
//!
//! - the **write pump** (spawned) drains the queue to the socket and sends
//!   periodic pings;
//! - the **read pump** (inline) decodes inbound frames and hands them to
//!   the hub, and treats silence longer than the pong timeout as a dead peer.
//!
//! Either pump ending closes the connection, which stops the other.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use devsync_core::{Envelope, Frame, UserId};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{CloseReason, Connection};
use super::handler::handle_text;
use super::registry::Hub;
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Content of the system frame every client receives first.
pub const CONNECTED: &str = "connected";

/// Per-session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Outbound queue capacity.
    pub queue_capacity: usize,
    /// Interval between server-initiated pings.
    pub ping_interval: Duration,
    /// Inbound silence after which the client is considered gone.
    pub pong_timeout: Duration,
    /// Deadline for a single transport write.
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            queue_capacity: cfg.queue_capacity,
            ping_interval: Duration::from_secs(cfg.ping_interval_secs),
            pong_timeout: Duration::from_secs(cfg.pong_timeout_secs),
            write_timeout: Duration::from_secs(cfg.write_timeout_secs),
        }
    }
}

/// How the write pump ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The connection was closed; queued frames were flushed.
    Drained,
    /// A write failed or exceeded the write timeout.
    Failed,
}

/// How the read pump ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the transport failed.
    Failed,
    /// Nothing arrived within the pong timeout.
    TimedOut,
    /// The connection was closed from elsewhere (eviction, write failure,
    /// shutdown).
    Closed,
}

/// Move frames from the outbound queue to the transport until the
/// connection closes or a write fails.
///
/// On close, frames already queued are flushed and a close frame is sent.
/// The connection is always closed when this returns.
pub async fn write_pump<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Frame>,
    conn: Arc<Connection>,
    cfg: SessionConfig,
) -> WriteOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval(cfg.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    let outcome = loop {
        tokio::select! {
            biased;
            () = conn.closed() => {
                break drain(&mut sink, &mut rx, &conn, &cfg).await;
            }
            frame = rx.recv() => {
                let Some(frame) = frame else { break WriteOutcome::Drained };
                if !write(&mut sink, text(&frame), &cfg).await {
                    break WriteOutcome::Failed;
                }
            }
            _ = ping.tick() => {
                if !write(&mut sink, Message::Ping(Vec::new().into()), &cfg).await {
                    break WriteOutcome::Failed;
                }
            }
        }
    };

    if outcome == WriteOutcome::Failed {
        let _ = conn.close(CloseReason::WriteFailed);
        debug!(conn_id = %conn.id, "write pump stopped after write failure");
    }
    outcome
}

async fn drain<S>(
    sink: &mut S,
    rx: &mut mpsc::Receiver<Frame>,
    conn: &Connection,
    cfg: &SessionConfig,
) -> WriteOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    rx.close();
    while let Some(frame) = rx.recv().await {
        if !write(sink, text(&frame), cfg).await {
            return WriteOutcome::Failed;
        }
    }
    let reason = conn.close_reason().unwrap_or(CloseReason::ClientGone);
    let _ = write(sink, close_message(reason), cfg).await;
    WriteOutcome::Drained
}

async fn write<S>(sink: &mut S, msg: Message, cfg: &SessionConfig) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(cfg.write_timeout, sink.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "websocket write failed");
            false
        }
        Err(_) => {
            debug!(timeout = ?cfg.write_timeout, "websocket write timed out");
            false
        }
    }
}

fn text(frame: &Frame) -> Message {
    Message::Text(frame.to_string().into())
}

fn close_message(reason: CloseReason) -> Message {
    let code = match reason {
        CloseReason::Shutdown => close_code::AWAY,
        CloseReason::SlowConsumer => close_code::POLICY,
        CloseReason::TimedOut | CloseReason::WriteFailed => close_code::ERROR,
        CloseReason::Replaced | CloseReason::ClientGone => close_code::NORMAL,
    };
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.as_str().into(),
    }))
}

/// Read inbound frames and hand them to the hub until the client leaves,
/// the transport fails, the peer goes silent, or the connection is closed.
pub async fn read_pump<St, E>(
    mut stream: St,
    conn: &Connection,
    hub: &Hub,
    cfg: &SessionConfig,
) -> ReadOutcome
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            biased;
            () = conn.closed() => return ReadOutcome::Closed,
            next = timeout(cfg.pong_timeout, stream.next()) => next,
        };

        let msg = match next {
            Err(_) => {
                warn!(user_id = %conn.user_id, timeout = ?cfg.pong_timeout, "client unresponsive, disconnecting");
                return ReadOutcome::TimedOut;
            }
            Ok(None) => return ReadOutcome::ClientClosed,
            Ok(Some(Err(e))) => {
                debug!(user_id = %conn.user_id, error = %e, "websocket read failed");
                return ReadOutcome::Failed;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => {
                let _ = handle_text(text.as_str(), conn, hub);
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = handle_text(text, conn, hub);
                }
                Err(_) => {
                    debug!(user_id = %conn.user_id, len = data.len(), "ignoring non-UTF8 binary frame");
                }
            },
            Message::Close(_) => {
                debug!(user_id = %conn.user_id, "client sent close frame");
                return ReadOutcome::ClientClosed;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Run a full session over an already-split transport.
///
/// 1. Queues the `connected` system frame, so it is always delivered first
/// 2. Starts the write pump and registers the connection with the hub
/// 3. Runs the read pump until the session ends or `shutdown` is
///    cancelled (already cancelled counts, so a session that registers
///    after the hub was emptied for shutdown still closes)
/// 4. Closes and unregisters the connection, then gives the write pump up
///    to the write timeout to flush before aborting it
pub async fn run_session<Si, St, E>(
    sink: Si,
    stream: St,
    user: UserId,
    hub: Arc<Hub>,
    cfg: SessionConfig,
    shutdown: CancellationToken,
) -> (ReadOutcome, Option<WriteOutcome>)
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (conn, rx) = Connection::channel(user, cfg.queue_capacity);
    match Envelope::system(user, CONNECTED).encode() {
        Ok(frame) => {
            let _ = conn.enqueue(frame);
        }
        Err(e) => warn!(error = %e, "failed to encode connected frame"),
    }

    info!(user_id = %user, conn_id = %conn.id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let mut writer = tokio::spawn(write_pump(sink, rx, conn.clone(), cfg.clone()));
    let _ = hub.register(conn.clone());

    let read = tokio::select! {
        biased;
        () = shutdown.cancelled() => {
            let _ = conn.close(CloseReason::Shutdown);
            ReadOutcome::Closed
        }
        read = read_pump(stream, &conn, &hub, &cfg) => read,
    };
    let reason = match read {
        ReadOutcome::ClientClosed | ReadOutcome::Failed => CloseReason::ClientGone,
        ReadOutcome::TimedOut => CloseReason::TimedOut,
        ReadOutcome::Closed => conn.close_reason().unwrap_or(CloseReason::ClientGone),
    };
    let _ = conn.close(reason);
    let _ = hub.unregister(&conn);

    let write = match timeout(cfg.write_timeout, &mut writer).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            warn!(error = %e, "write pump task failed");
            None
        }
        Err(_) => {
            writer.abort();
            debug!(conn_id = %conn.id, "write pump did not drain in time, aborted");
            None
        }
    };

    let reason = conn.close_reason().unwrap_or(reason);
    info!(
        user_id = %user,
        conn_id = %conn.id,
        reason = %reason,
        ?read,
        ?write,
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(conn.age().as_secs_f64());
    (read, write)
}

/// Run a session for an upgraded axum WebSocket.
#[instrument(skip_all, fields(user_id = %user))]
pub async fn run_ws_session(
    ws: WebSocket,
    user: UserId,
    hub: Arc<Hub>,
    cfg: SessionConfig,
    shutdown: CancellationToken,
) {
    let (sink, stream) = ws.split();
    let _ = run_session(sink, stream, user, hub, cfg, shutdown).await;
}
