use std::time::Duration;

use axum::extract::ws::Message;
use tokio::time::timeout;

use super::events::EventPayload;
use super::registry::ChannelRegistry;
use super::StreamChannel;

/// How long one publish waits on a connection's full send queue before
/// treating the connection as dead. A healthy client never fills the
/// 32-frame queue, so this deadline is only ever paid for a stalled
/// consumer — and bounds how long such a client can hold up delivery to
/// the user's remaining connections.
pub const SEND_TIMEOUT: Duration = Duration::from_millis(250);

/// Fan-out dispatcher. Owns the three channel registries; connection
/// actors register into them and producers (CRUD handlers, the
/// notification writer) call [`EventHub::publish`] after a committed
/// mutation.
///
/// Built once at startup and shared through `AppState`.
pub struct EventHub {
    notifications: ChannelRegistry,
    tasks: ChannelRegistry,
    projects: ChannelRegistry,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            notifications: ChannelRegistry::new(StreamChannel::Notifications),
            tasks: ChannelRegistry::new(StreamChannel::Tasks),
            projects: ChannelRegistry::new(StreamChannel::Projects),
        }
    }

    pub fn registry(&self, channel: StreamChannel) -> &ChannelRegistry {
        match channel {
            StreamChannel::Notifications => &self.notifications,
            StreamChannel::Tasks => &self.tasks,
            StreamChannel::Projects => &self.projects,
        }
    }

    /// Deliver `event` to every live connection `user_id` has open on
    /// `channel`. Best-effort and fire-and-forget: a connection that
    /// fails the bounded send is closed and unregistered, the rest still
    /// receive the event, and nothing is reported to the caller. A user
    /// with no open connections is a silent no-op.
    pub async fn publish(&self, user_id: i64, channel: StreamChannel, event: &EventPayload) {
        let Some(frame) = event.to_frame() else {
            return;
        };

        self.deliver(user_id, channel, &frame).await;

        // Task events are mirrored to the user's notification streams —
        // the web client's notification view still renders task changes
        // from that socket. Removal candidate, tracked in DESIGN.md.
        if channel == StreamChannel::Tasks {
            self.deliver(user_id, StreamChannel::Notifications, &frame)
                .await;
        }
    }

    async fn deliver(&self, user_id: i64, channel: StreamChannel, frame: &Message) {
        let registry = self.registry(channel);

        for handle in registry.snapshot(user_id) {
            let delivered = match timeout(SEND_TIMEOUT, handle.send_frame(frame.clone())).await {
                Ok(Ok(())) => true,
                // Queue closed: the writer task is already gone.
                Ok(Err(_)) => false,
                // Queue still full at the deadline: stalled consumer.
                Err(_) => false,
            };

            if !delivered {
                tracing::debug!(
                    user_id,
                    connection_id = %handle.id,
                    channel = channel.as_str(),
                    "Dropping connection after failed delivery"
                );
                handle.close();
                registry.unregister(user_id, handle.id);
            }
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
