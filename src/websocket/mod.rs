use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod events;
pub mod handlers;
pub mod typing;

struct Connection {
    conn_id: Uuid,
    sender: UnboundedSender<Message>,
}

#[derive(Default)]
struct RegistryInner {
    // user_id -> authoritative live connection (last-connect-wins)
    connections: HashMap<i64, Connection>,
    // conversation_id -> users currently viewing it
    rooms: HashMap<i64, HashSet<i64>>,
}

/// Process-wide live-connection registry, constructed once at gateway
/// startup and injected into handlers. A user has at most one authoritative
/// connection: registering again overwrites the entry and the previous
/// socket stops receiving pushes. Single-process by design; multi-instance
/// fan-out would need a shared pub/sub layer behind this interface.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, displacing any previous one.
    /// Returns the connection id (used to guard cleanup) and the receiving
    /// end the socket task forwards from.
    pub async fn register(&self, user_id: i64) -> (Uuid, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        let conn_id = Uuid::new_v4();
        let mut guard = self.inner.write().await;
        guard.connections.insert(
            user_id,
            Connection {
                conn_id,
                sender: tx,
            },
        );
        (conn_id, rx)
    }

    /// Remove the user's connection if `conn_id` is still the authoritative
    /// one. A stale id (the connection was displaced by a reconnect) is a
    /// no-op so the newer session's registration and room memberships
    /// survive the old task's cleanup. Returns whether an entry was removed.
    pub async fn unregister(&self, user_id: i64, conn_id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        let current = match guard.connections.get(&user_id) {
            Some(conn) if conn.conn_id == conn_id => true,
            _ => false,
        };
        if current {
            guard.connections.remove(&user_id);
            for members in guard.rooms.values_mut() {
                members.remove(&user_id);
            }
            guard.rooms.retain(|_, members| !members.is_empty());
        }
        current
    }

    pub async fn join_room(&self, conversation_id: i64, user_id: i64) {
        let mut guard = self.inner.write().await;
        guard
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
    }

    pub async fn leave_room(&self, conversation_id: i64, user_id: i64) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            members.remove(&user_id);
            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
    }

    /// Fan a message out to every member of a conversation room, including
    /// the sender's own connection (multi-tab consistency).
    pub async fn broadcast_room(&self, conversation_id: i64, msg: Message) {
        let guard = self.inner.read().await;
        if let Some(members) = guard.rooms.get(&conversation_id) {
            for user_id in members {
                if let Some(conn) = guard.connections.get(user_id) {
                    let _ = conn.sender.send(msg.clone());
                }
            }
        }
    }

    /// Fan a message out to every connected socket (presence changes).
    pub async fn broadcast_all(&self, msg: Message) {
        let guard = self.inner.read().await;
        for conn in guard.connections.values() {
            let _ = conn.sender.send(msg.clone());
        }
    }

    /// Deliver to one user's authoritative connection. Returns false when
    /// the user has no live connection.
    pub async fn send_to_user(&self, user_id: i64, msg: Message) -> bool {
        let guard = self.inner.read().await;
        match guard.connections.get(&user_id) {
            Some(conn) => conn.sender.send(msg).is_ok(),
            None => false,
        }
    }

    pub async fn is_connected(&self, user_id: i64) -> bool {
        self.inner.read().await.connections.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[tokio::test]
    async fn last_connect_wins() {
        let registry = ConnectionRegistry::new();
        let (old_id, mut old_rx) = registry.register(1).await;
        let (_new_id, mut new_rx) = registry.register(1).await;

        registry.send_to_user(1, text("hello")).await;

        // Only the newer connection receives pushes
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());

        // The displaced task's cleanup must not remove the new registration
        assert!(!registry.unregister(1, old_id).await);
        assert!(registry.is_connected(1).await);
    }

    #[tokio::test]
    async fn room_broadcast_is_scoped_to_members() {
        let registry = ConnectionRegistry::new();
        let (_, mut rx_a) = registry.register(1).await;
        let (_, mut rx_b) = registry.register(2).await;
        let (_, mut rx_c) = registry.register(3).await;

        registry.join_room(10, 1).await;
        registry.join_room(10, 2).await;

        registry.broadcast_room(10, text("m")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_room_membership() {
        let registry = ConnectionRegistry::new();
        let (conn_id, _rx) = registry.register(1).await;
        registry.join_room(10, 1).await;

        assert!(registry.unregister(1, conn_id).await);
        assert!(!registry.is_connected(1).await);

        // No receiver left; broadcast must not panic
        registry.broadcast_room(10, text("m")).await;
    }

    #[tokio::test]
    async fn global_broadcast_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let (_, mut rx_a) = registry.register(1).await;
        let (_, mut rx_b) = registry.register(2).await;

        registry.broadcast_all(text("presence")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
