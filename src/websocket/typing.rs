//! Self-expiring typing indicators
//!
//! A typing indicator lives until the client sends an explicit stop or the
//! timer runs out, whichever comes first. Restarting an active indicator
//! aborts the previous timer, so the expiry callback fires at most once per
//! indicator lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

type TimerKey = (Uuid, Uuid); // (room_id, user_id)

/// Cancellable per-user-per-room typing timers
#[derive(Clone)]
pub struct TypingTracker {
    ttl: Duration,
    timers: Arc<RwLock<HashMap<TimerKey, JoinHandle<()>>>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            timers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start (or refresh) the typing timer for a user in a room.
    ///
    /// `on_expire` runs only if no stop or restart arrives within the TTL.
    /// Returns true when this call started a fresh indicator, false when it
    /// refreshed an active one.
    pub async fn start<F>(&self, room_id: Uuid, user_id: Uuid, on_expire: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = (room_id, user_id);
        let ttl = self.ttl;
        let timers = self.timers.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // Remove ourselves before firing so a concurrent stop() can't
            // abort a timer that already expired.
            timers.write().await.remove(&key);
            on_expire.await;
        });

        let mut guard = self.timers.write().await;
        match guard.insert(key, handle) {
            Some(previous) => {
                previous.abort();
                false
            }
            None => true,
        }
    }

    /// Cancel the pending timer. Returns true if an indicator was active.
    pub async fn stop(&self, room_id: Uuid, user_id: Uuid) -> bool {
        let mut guard = self.timers.write().await;
        if let Some(handle) = guard.remove(&(room_id, user_id)) {
            handle.abort();
            true
        } else {
            false
        }
    }

    /// Cancel all timers for a user (connection closed)
    pub async fn stop_all_for_user(&self, user_id: Uuid) -> Vec<Uuid> {
        let mut guard = self.timers.write().await;
        let rooms: Vec<Uuid> = guard
            .keys()
            .filter(|(_, u)| *u == user_id)
            .map(|(r, _)| *r)
            .collect();

        for room_id in &rooms {
            if let Some(handle) = guard.remove(&(*room_id, user_id)) {
                handle.abort();
            }
        }
        rooms
    }

    pub async fn active_count(&self) -> usize {
        self.timers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_future(counter: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_timer_expires_and_fires_callback() {
        let tracker = TypingTracker::new(Duration::from_millis(20));
        let fired = Arc::new(AtomicUsize::new(0));
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(tracker.start(room, user, counter_future(fired.clone())).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_explicit_stop_cancels_expiry() {
        let tracker = TypingTracker::new(Duration::from_millis(30));
        let fired = Arc::new(AtomicUsize::new(0));
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        tracker.start(room, user, counter_future(fired.clone())).await;
        assert!(tracker.stop(room, user).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restart_refreshes_timer() {
        let tracker = TypingTracker::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(tracker.start(room, user, counter_future(fired.clone())).await);
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Refresh before the first timer fires; only the refreshed timer
        // should reach expiry.
        assert!(!tracker.start(room, user, counter_future(fired.clone())).await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_all_for_user() {
        let tracker = TypingTracker::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));
        let user = Uuid::new_v4();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        tracker.start(room_a, user, counter_future(fired.clone())).await;
        tracker.start(room_b, user, counter_future(fired.clone())).await;

        let mut rooms = tracker.stop_all_for_user(user).await;
        rooms.sort();
        let mut expected = vec![room_a, room_b];
        expected.sort();
        assert_eq!(rooms, expected);
        assert_eq!(tracker.active_count().await, 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
