use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod message_types;
pub mod streams;
pub mod typing;

/// Unique identifier for a WebSocket subscriber
///
/// Each WebSocket connection gets a unique subscriber ID when it registers.
/// This allows for precise cleanup when connections close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber entry with ID and channel
struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Connection registry for WebSocket subscribers
///
/// Tracks which WebSocket connections are subscribed to which rooms.
/// Supports precise cleanup using subscriber IDs to prevent memory leaks.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // room_id -> list of subscribers
    inner: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to a room
    ///
    /// Returns a tuple of (subscriber_id, receiver) where:
    /// - subscriber_id: Unique ID for this subscription (used for cleanup)
    /// - receiver: Channel to receive broadcast messages
    pub async fn add_subscriber(&self, room_id: Uuid) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let subscriber = Subscriber {
            id: subscriber_id,
            sender: tx,
        };

        let mut guard = self.inner.write().await;
        guard.entry(room_id).or_default().push(subscriber);

        tracing::debug!(
            "Added subscriber {:?} to room {}, total subscribers: {}",
            subscriber_id,
            room_id,
            guard.get(&room_id).map(|v| v.len()).unwrap_or(0)
        );

        (subscriber_id, rx)
    }

    /// Remove a specific subscriber from a room
    ///
    /// Must be called when a WebSocket connection closes, otherwise the
    /// registry leaks channel senders.
    pub async fn remove_subscriber(&self, room_id: Uuid, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(&room_id) {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != subscriber_id);
            let after = subscribers.len();

            if before != after {
                tracing::debug!(
                    "Removed subscriber {:?} from room {}, remaining: {}",
                    subscriber_id,
                    room_id,
                    after
                );
            }

            // Clean up empty room entries
            if subscribers.is_empty() {
                guard.remove(&room_id);
                tracing::debug!("Removed empty room {} from registry", room_id);
            }
        }
    }

    /// Broadcast message to all subscribers of a room
    ///
    /// Automatically cleans up dead senders (where send fails).
    pub async fn broadcast(&self, room_id: Uuid, msg: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(&room_id) {
            let before = subscribers.len();

            subscribers.retain(|subscriber| subscriber.sender.send(msg.clone()).is_ok());

            let after = subscribers.len();
            if before != after {
                tracing::debug!(
                    "Broadcast to room {}: {} dead senders cleaned up, {} active",
                    room_id,
                    before - after,
                    after
                );
            }
        }
    }

    /// Get subscriber count for a room (for debugging/metrics)
    pub async fn subscriber_count(&self, room_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&room_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_broadcast_receive() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();

        let (_id, mut rx) = registry.add_subscriber(room).await;
        registry.broadcast(room, "hello".to_string()).await;

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_remove_subscriber_cleans_empty_room() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();

        let (id, _rx) = registry.add_subscriber(room).await;
        assert_eq!(registry.subscriber_count(room).await, 1);

        registry.remove_subscriber(room, id).await;
        assert_eq!(registry.subscriber_count(room).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_dead_senders() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();

        let (_id1, rx1) = registry.add_subscriber(room).await;
        let (_id2, mut rx2) = registry.add_subscriber(room).await;
        drop(rx1);

        registry.broadcast(room, "ping".to_string()).await;

        assert_eq!(registry.subscriber_count(room).await, 1);
        assert_eq!(rx2.recv().await.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_broadcast_does_not_cross_rooms() {
        let registry = ConnectionRegistry::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        let (_ida, mut rx_a) = registry.add_subscriber(room_a).await;
        let (_idb, mut rx_b) = registry.add_subscriber(room_b).await;

        registry.broadcast(room_a, "only-a".to_string()).await;

        assert_eq!(rx_a.recv().await.as_deref(), Some("only-a"));
        assert!(rx_b.try_recv().is_err());
    }
}
