//! Expiring typing-indicator state. Entries auto-expire after a TTL so a
//! client that disconnects mid-keystroke never leaves a permanent "user is
//! typing" ghost; a background sweeper emits the synthetic stop events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone)]
pub struct TypingTracker {
    ttl: Duration,
    // conversation_id -> user_id -> expiry deadline
    inner: Arc<Mutex<HashMap<i64, HashMap<i64, Instant>>>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a typing start (or refresh), pushing the expiry deadline out.
    pub fn start(&self, conversation_id: i64, user_id: i64) {
        let deadline = Instant::now() + self.ttl;
        let mut guard = self.inner.lock().unwrap();
        guard
            .entry(conversation_id)
            .or_default()
            .insert(user_id, deadline);
    }

    /// Explicit stop. Returns true when the user was actually tracked, so
    /// callers can suppress redundant stop broadcasts.
    pub fn stop(&self, conversation_id: i64, user_id: i64) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let removed = guard
            .get_mut(&conversation_id)
            .map(|users| users.remove(&user_id).is_some())
            .unwrap_or(false);
        if removed {
            if let Some(users) = guard.get(&conversation_id) {
                if users.is_empty() {
                    guard.remove(&conversation_id);
                }
            }
        }
        removed
    }

    /// Drop every entry whose deadline passed and return them so the caller
    /// can broadcast the implicit stop events.
    pub fn sweep_expired(&self, now: Instant) -> Vec<(i64, i64)> {
        let mut expired = Vec::new();
        let mut guard = self.inner.lock().unwrap();
        for (&conversation_id, users) in guard.iter_mut() {
            users.retain(|&user_id, &mut deadline| {
                if deadline <= now {
                    expired.push((conversation_id, user_id));
                    false
                } else {
                    true
                }
            });
        }
        guard.retain(|_, users| !users.is_empty());
        expired
    }

    pub fn is_typing(&self, conversation_id: i64, user_id: i64) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get(&conversation_id)
            .map(|users| users.contains_key(&user_id))
            .unwrap_or(false)
    }
}

/// Periodically sweep the tracker and broadcast `user_typing: false` for
/// every expired entry.
pub fn spawn_sweeper(
    tracker: TypingTracker,
    registry: crate::websocket::ConnectionRegistry,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    use crate::websocket::events::ServerEvent;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for (conversation_id, user_id) in tracker.sweep_expired(Instant::now()) {
                let event = ServerEvent::UserTyping {
                    conversation_id,
                    user_id,
                    is_typing: false,
                };
                registry
                    .broadcast_room(conversation_id, event.to_message())
                    .await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let tracker = TypingTracker::new(Duration::from_millis(100));
        let t0 = Instant::now();
        tracker.start(1, 7);

        assert!(tracker.sweep_expired(t0 + Duration::from_millis(50)).is_empty());
        assert!(tracker.is_typing(1, 7));

        let expired = tracker.sweep_expired(t0 + Duration::from_millis(150));
        assert_eq!(expired, vec![(1, 7)]);
        assert!(!tracker.is_typing(1, 7));
    }

    #[test]
    fn restart_refreshes_the_deadline() {
        let tracker = TypingTracker::new(Duration::from_millis(100));
        let t0 = Instant::now();
        tracker.start(1, 7);

        // A fresh keystroke pushes the deadline out
        tracker.start(1, 7);
        assert!(tracker
            .sweep_expired(t0 + Duration::from_millis(90))
            .is_empty());
        assert!(tracker.is_typing(1, 7));
    }

    #[test]
    fn explicit_stop_reports_whether_entry_existed() {
        let tracker = TypingTracker::new(Duration::from_secs(3));
        tracker.start(1, 7);

        assert!(tracker.stop(1, 7));
        assert!(!tracker.stop(1, 7));
        assert!(!tracker.is_typing(1, 7));
    }

    // Observers of a room see `user_typing: false` arrive on its own after
    // the typist goes idle past the TTL.
    #[tokio::test(start_paused = true)]
    async fn sweeper_broadcasts_implicit_stop() {
        let registry = crate::websocket::ConnectionRegistry::new();
        let (_, mut rx) = registry.register(9).await;
        registry.join_room(1, 9).await;

        let tracker = TypingTracker::new(Duration::from_secs(3));
        tracker.start(1, 7);
        let sweeper = spawn_sweeper(tracker.clone(), registry.clone(), Duration::from_millis(500));

        // Paused time auto-advances while the runtime is otherwise idle, so
        // the interval ticks and the entry expires without real waiting.
        let frame = rx.recv().await.expect("implicit stop frame");
        let text = match frame {
            axum::extract::ws::Message::Text(text) => text,
            other => panic!("unexpected frame: {other:?}"),
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["userId"], 7);
        assert_eq!(json["isTyping"], false);
        assert!(!tracker.is_typing(1, 7));

        sweeper.abort();
    }

    #[test]
    fn sweep_is_scoped_per_conversation_and_user() {
        let tracker = TypingTracker::new(Duration::from_millis(100));
        let t0 = Instant::now();
        tracker.start(1, 7);
        tracker.start(2, 8);

        let mut expired = tracker.sweep_expired(t0 + Duration::from_millis(200));
        expired.sort_unstable();
        assert_eq!(expired, vec![(1, 7), (2, 8)]);
    }
}
