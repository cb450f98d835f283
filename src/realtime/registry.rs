use dashmap::DashMap;

use super::{ConnectionHandle, ConnectionId, StreamChannel};

/// Connection registry for a single logical channel: user id → that
/// user's open connections on the channel.
///
/// The DashMap shard lock serializes register/unregister/snapshot for any
/// given user bucket, so fan-out never observes a half-removed handle.
/// Each channel gets its own registry instance (built by `EventHub`), so
/// the three channels never block each other.
pub struct ChannelRegistry {
    channel: StreamChannel,
    connections: DashMap<i64, Vec<ConnectionHandle>>,
}

impl ChannelRegistry {
    pub fn new(channel: StreamChannel) -> Self {
        Self {
            channel,
            connections: DashMap::new(),
        }
    }

    pub fn channel(&self) -> StreamChannel {
        self.channel
    }

    /// Add a connection for its user. The handle is a fan-out target as
    /// soon as this returns.
    pub fn register(&self, handle: ConnectionHandle) {
        let user_id = handle.user_id;
        self.connections.entry(user_id).or_default().push(handle);

        tracing::debug!(
            user_id,
            channel = self.channel.as_str(),
            connections = self.connection_count(user_id),
            "Connection registered"
        );
    }

    /// Remove one connection by id. Idempotent: removing a connection
    /// that is already gone is a no-op. Empty user buckets are dropped so
    /// the map does not grow with connect/disconnect churn.
    pub fn unregister(&self, user_id: i64, id: ConnectionId) {
        let mut bucket_empty = false;
        if let Some(mut entry) = self.connections.get_mut(&user_id) {
            entry.retain(|handle| handle.id != id);
            bucket_empty = entry.is_empty();
        }

        if bucket_empty {
            // The bucket may have been repopulated since the guard above
            // was dropped; remove_if re-checks under the shard lock.
            self.connections
                .remove_if(&user_id, |_, handles| handles.is_empty());
        }

        tracing::debug!(
            user_id,
            channel = self.channel.as_str(),
            "Connection unregistered"
        );
    }

    /// Current connections for a user, cloned under the shard lock.
    pub fn snapshot(&self, user_id: i64) -> Vec<ConnectionHandle> {
        self.connections
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, user_id: i64) -> usize {
        self.connections
            .get(&user_id)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }
}
