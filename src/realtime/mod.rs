//! Real-time push subsystem.
//!
//! Tracks which users have live WebSocket streams open, on which logical
//! channel, and fans mutation events out to every open stream of the
//! target user. Delivery is best-effort and at-most-once per connection:
//! a handle that fails a bounded send is closed and dropped, and nothing
//! is retried or replayed.

pub mod actor;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, Notify};

/// Outbound frames queued per connection before publishes start waiting
/// on the `SEND_TIMEOUT` deadline in the dispatcher.
pub const SEND_QUEUE_DEPTH: usize = 32;

/// Logical event stream a connection subscribes to. Each channel has its
/// own registry so a burst on one never contends with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamChannel {
    Notifications,
    Tasks,
    Projects,
}

impl StreamChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Tasks => "tasks",
            Self::Projects => "projects",
        }
    }
}

/// Process-unique identifier for one registered connection. Unregistration
/// matches on this, not on value equality — a user with several tabs holds
/// several otherwise-identical handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live WebSocket registered for fan-out. Clones share the same
/// underlying send queue and shutdown signal; the registry holds one
/// clone, the connection actor holds another.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: i64,
    pub channel: StreamChannel,
    tx: mpsc::Sender<Message>,
    shutdown: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its send queue. The
    /// receiver goes to the connection's writer task; the handle goes
    /// into the registry.
    pub fn new(user_id: i64, channel: StreamChannel) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        let handle = Self {
            id: ConnectionId::next(),
            user_id,
            channel,
            tx,
            shutdown: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    /// Queue a frame for the writer task. Waits for queue capacity; the
    /// dispatcher bounds that wait with `SEND_TIMEOUT`. Fails once the
    /// writer task is gone.
    pub async fn send_frame(&self, frame: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.tx.send(frame).await
    }

    /// Whether the connection can still accept frames.
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Ask the connection actor to tear the stream down. Idempotent; the
    /// actor's reader loop observes this between frames.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Signal awaited by the reader loop to detect a server-side close.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }
}
