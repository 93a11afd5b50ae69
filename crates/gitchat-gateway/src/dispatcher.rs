use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use gitchat_types::events::GatewayEvent;

/// Presence registry and fan-out channel. Owns the username -> connection
/// mapping; connections register on join and are removed on disconnect, and
/// every churn re-broadcasts the full online-user snapshot.
///
/// Multi-device policy is last-connect-wins: registering a username that is
/// already online replaces its handle, and a stale connection's cleanup is
/// conn_id-guarded so it cannot evict its successor.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Events every connection should see (the online-users snapshot).
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: username -> (conn_id, sender)
    connections: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to global events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a connection for `username`, replacing any prior handle.
    /// Returns (conn_id, receiver) and broadcasts the presence snapshot.
    pub async fn register(&self, username: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(username.to_string(), (conn_id, tx));

        self.broadcast_online_users().await;
        (conn_id, rx)
    }

    /// Remove a connection, but only if conn_id still owns the entry.
    /// A newer connection for the same user must not be evicted by the old
    /// one's teardown.
    pub async fn unregister(&self, username: &str, conn_id: Uuid) {
        let removed = {
            let mut connections = self.inner.connections.write().await;
            match connections.get(username) {
                Some((stored, _)) if *stored == conn_id => {
                    connections.remove(username);
                    true
                }
                _ => false,
            }
        };

        if removed {
            self.broadcast_online_users().await;
        }
    }

    /// Push a targeted event to one user's live connection.
    /// Returns false when the user has no active connection; the event is
    /// dropped and REST history is the catch-up path.
    pub async fn send_to_user(&self, username: &str, event: GatewayEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(username) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.inner.connections.read().await.contains_key(username)
    }

    /// Current online usernames, sorted for stable snapshots.
    pub async fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .inner
            .connections
            .read()
            .await
            .keys()
            .cloned()
            .collect();
        users.sort();
        users
    }

    async fn broadcast_online_users(&self) {
        let users = self.online_users().await;
        self.broadcast(GatewayEvent::OnlineUsers { users });
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_lookup_unregister() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.is_online("alice").await);

        let (conn_id, _rx) = dispatcher.register("alice").await;
        assert!(dispatcher.is_online("alice").await);
        assert_eq!(dispatcher.online_users().await, vec!["alice".to_string()]);

        dispatcher.unregister("alice", conn_id).await;
        assert!(!dispatcher.is_online("alice").await);
    }

    #[tokio::test]
    async fn last_connect_wins() {
        let dispatcher = Dispatcher::new();

        let (old_conn, mut old_rx) = dispatcher.register("alice").await;
        let (_new_conn, mut new_rx) = dispatcher.register("alice").await;

        // Targeted sends land on the most recent connection only.
        let delivered = dispatcher
            .send_to_user(
                "alice",
                GatewayEvent::Ready {
                    username: "alice".into(),
                },
            )
            .await;
        assert!(delivered);
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());

        // The superseded connection's teardown must not evict the new one.
        dispatcher.unregister("alice", old_conn).await;
        assert!(dispatcher.is_online("alice").await);
    }

    #[tokio::test]
    async fn offline_send_is_dropped() {
        let dispatcher = Dispatcher::new();
        let delivered = dispatcher
            .send_to_user(
                "ghost",
                GatewayEvent::Ready {
                    username: "ghost".into(),
                },
            )
            .await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn churn_broadcasts_full_snapshot() {
        let dispatcher = Dispatcher::new();
        let mut events = dispatcher.subscribe();

        let (conn_a, _rx_a) = dispatcher.register("alice").await;
        let (_conn_b, _rx_b) = dispatcher.register("bob").await;

        match events.recv().await.unwrap() {
            GatewayEvent::OnlineUsers { users } => assert_eq!(users, vec!["alice".to_string()]),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            GatewayEvent::OnlineUsers { users } => {
                assert_eq!(users, vec!["alice".to_string(), "bob".to_string()])
            }
            other => panic!("unexpected event: {:?}", other),
        }

        dispatcher.unregister("alice", conn_a).await;
        match events.recv().await.unwrap() {
            GatewayEvent::OnlineUsers { users } => assert_eq!(users, vec!["bob".to_string()]),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
