//! # Presence Tracker
//!
//! Maintains online/away/offline status per user in Redis and broadcasts
//! transitions to every room the user participates in. Transitions are
//! driven by connection lifecycle events, independent of message traffic.
//!
//! Disconnects are debounced: the offline broadcast only fires if the user
//! has not reconnected within the grace window, so a flapping mobile client
//! does not spam its rooms with status changes.

use crate::models::{PresenceRecord, PresenceStatus};
use crate::redis_client::RedisClient;
use crate::services::room_service::RoomService;
use crate::websocket::events::{broadcast_event, WebSocketEvent};
use crate::websocket::ConnectionRegistry;
use chrono::{DateTime, Utc};
use db_pool::PgPool;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

fn presence_key(user_id: Uuid) -> String {
    format!("presence:{}", user_id)
}

/// Cancellable one-shot timers keyed by user, used to debounce disconnects.
/// Scheduling for a key that already has a timer replaces the old one.
#[derive(Clone, Default)]
pub struct DebounceMap {
    inner: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
}

impl DebounceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn schedule<F>(&self, key: Uuid, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = self.inner.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.write().await.remove(&key);
            on_fire.await;
        });

        if let Some(previous) = self.inner.write().await.insert(key, handle) {
            previous.abort();
        }
    }

    /// Returns true if a pending timer was cancelled
    pub async fn cancel(&self, key: Uuid) -> bool {
        if let Some(handle) = self.inner.write().await.remove(&key) {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[derive(Clone)]
pub struct PresenceTracker {
    db: PgPool,
    redis: RedisClient,
    registry: ConnectionRegistry,
    grace: Duration,
    pending_offline: DebounceMap,
    // Live socket count per user on this instance; a user is only
    // considered disconnected when the last socket closes.
    connections: Arc<RwLock<HashMap<Uuid, usize>>>,
}

impl PresenceTracker {
    pub fn new(db: PgPool, redis: RedisClient, registry: ConnectionRegistry, grace: Duration) -> Self {
        Self {
            db,
            redis,
            registry,
            grace,
            pending_offline: DebounceMap::new(),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current presence record; users never seen are reported offline.
    pub async fn get(&self, user_id: Uuid) -> Result<PresenceRecord, crate::error::AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(presence_key(user_id)).await?;

        if fields.is_empty() {
            return Ok(PresenceRecord {
                user_id,
                status: PresenceStatus::Offline,
                last_seen_at: DateTime::<Utc>::MIN_UTC,
            });
        }

        let status = fields
            .get("status")
            .and_then(|s| PresenceStatus::from_db(s))
            .unwrap_or(PresenceStatus::Offline);
        let last_seen_at = fields
            .get("last_seen_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(PresenceRecord {
            user_id,
            status,
            last_seen_at,
        })
    }

    /// Write a status transition (last-write-wins by timestamp) and fan it
    /// out when the effective status changed.
    pub async fn set_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
    ) -> Result<(), crate::error::AppError> {
        let current = self.get(user_id).await?;
        let incoming = PresenceRecord::new(user_id, status);
        let merged = current.clone().merge(incoming);

        self.store(&merged).await?;

        if merged.status != current.status {
            self.fanout(&merged).await;
        }

        Ok(())
    }

    /// A socket for this user opened. Cancels any pending offline timer;
    /// only the first socket triggers an online broadcast.
    pub async fn mark_connected(&self, user_id: Uuid) -> Result<(), crate::error::AppError> {
        self.pending_offline.cancel(user_id).await;

        let first_socket = {
            let mut guard = self.connections.write().await;
            let count = guard.entry(user_id).or_insert(0);
            *count += 1;
            *count == 1
        };

        if first_socket {
            self.set_status(user_id, PresenceStatus::Online).await?;
        } else {
            self.touch(user_id).await?;
        }

        Ok(())
    }

    /// A socket for this user closed. When the last socket is gone, start
    /// the grace timer; the offline broadcast fires only if no reconnect
    /// arrives in time.
    pub async fn mark_disconnected(&self, user_id: Uuid) {
        let last_socket = {
            let mut guard = self.connections.write().await;
            match guard.get_mut(&user_id) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    guard.remove(&user_id);
                    true
                }
                None => false,
            }
        };

        if !last_socket {
            return;
        }

        let tracker = self.clone();
        self.pending_offline
            .schedule(user_id, self.grace, async move {
                // Re-check: a reconnect may have landed between timer fire
                // and this task running.
                if tracker.connections.read().await.contains_key(&user_id) {
                    return;
                }
                if let Err(e) = tracker.set_status(user_id, PresenceStatus::Offline).await {
                    tracing::warn!(error = %e, user_id = %user_id, "offline transition failed");
                }
            })
            .await;
    }

    /// Refresh last_seen_at without a status transition (heartbeats)
    pub async fn touch(&self, user_id: Uuid) -> Result<(), crate::error::AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .hset(
                presence_key(user_id),
                "last_seen_at",
                Utc::now().to_rfc3339(),
            )
            .await?;
        Ok(())
    }

    async fn store(&self, record: &PresenceRecord) -> Result<(), crate::error::AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .hset_multiple(
                presence_key(record.user_id),
                &[
                    ("status", record.status.to_db().to_string()),
                    ("last_seen_at", record.last_seen_at.to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Publish the transition to every room the user participates in.
    /// Fan-out is best-effort: a failed room publish is logged, not fatal.
    async fn fanout(&self, record: &PresenceRecord) {
        let room_ids = match RoomService::room_ids_for_user(&self.db, record.user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %record.user_id, "presence fanout skipped");
                return;
            }
        };

        for room_id in room_ids {
            let event = WebSocketEvent::PresenceChanged {
                user_id: record.user_id,
                status: record.status.to_db().to_string(),
                last_seen_at: record.last_seen_at,
            };

            if let Err(e) =
                broadcast_event(&self.registry, &self.redis, room_id, record.user_id, event).await
            {
                tracing::warn!(error = %e, room_id = %room_id, "presence broadcast failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_debounce_fires_after_delay() {
        let map = DebounceMap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let counter = fired.clone();
        map.schedule(key, Duration::from_millis(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(map.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_suppresses_fire() {
        let map = DebounceMap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let counter = fired.clone();
        map.schedule(key, Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert!(map.cancel(key).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_pending_timer() {
        let map = DebounceMap::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let counter = first.clone();
        map.schedule(key, Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        let counter = second.clone();
        map.schedule(key, Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_pending_returns_false() {
        let map = DebounceMap::new();
        assert!(!map.cancel(Uuid::new_v4()).await);
    }
}
