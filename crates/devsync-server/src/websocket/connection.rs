//! Server-side state of one live client connection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use devsync_core::{ConnectionId, Frame, UserId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Why a connection was closed. The first reason recorded wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection registered for the same user.
    Replaced,
    /// The outbound queue overflowed.
    SlowConsumer,
    /// The client closed the socket or the read side ended.
    ClientGone,
    /// No inbound traffic within the liveness window.
    TimedOut,
    /// A transport write failed or timed out.
    WriteFailed,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::SlowConsumer => "slow_consumer",
            Self::ClientGone => "client_gone",
            Self::TimedOut => "timed_out",
            Self::WriteFailed => "write_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a non-blocking enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueue {
    /// The frame is in the queue.
    Queued,
    /// The queue is at capacity; the frame was not queued.
    Full,
    /// The connection is closed; the frame was not queued.
    Closed,
}

/// One authenticated client connection.
///
/// The outbound queue is a bounded `mpsc` channel drained by the write pump.
/// Closing is signalled through a [`CancellationToken`] rather than by
/// dropping the sender, because the registry and the session both hold
/// handles to the same connection.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Authenticated owner.
    pub user_id: UserId,
    tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
    reason: OnceLock<CloseReason>,
    /// When this connection was established.
    pub connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl Connection {
    /// Create a connection around an existing queue sender.
    pub fn new(user_id: UserId, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            tx,
            closed: CancellationToken::new(),
            reason: OnceLock::new(),
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Create a connection and the receiving half of its outbound queue.
    pub fn channel(user_id: UserId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(user_id, tx)), rx)
    }

    /// Enqueue a frame without waiting.
    pub fn enqueue(&self, frame: Frame) -> Enqueue {
        if self.closed.is_cancelled() {
            return Enqueue::Closed;
        }
        match self.tx.try_send(frame) {
            Ok(()) => Enqueue::Queued,
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Enqueue::Full
            }
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Close the connection. Returns `true` for the call that closed it.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.closed.cancel();
        first
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// The reason recorded by the first close, if closed.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Frames rejected because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
