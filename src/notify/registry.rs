//! Connection registry
//!
//! The single synchronized owner of all live per-user connections. The
//! transport (whatever serves the sockets) registers a connection and drains
//! the returned receiver; the event consumer pushes signals through here.
//!
//! Invariants: at most one live connection per user; a new connection for a
//! user closes and replaces the old one (last-connection-wins); a failed
//! push evicts the mapping so later events never touch a dead connection.

use crate::notify::PushEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffered signals per connection; pushes never block the consumer loop.
const PUSH_BUFFER: usize = 8;

/// Handle identifying one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(Uuid);

/// Outcome of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The signal was handed to the user's live connection.
    Delivered,
    /// No live connection for the user (including one evicted just now).
    NotConnected,
}

struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<PushEvent>,
}

/// Registry of live per-user connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<i64, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for a user.
    ///
    /// Returns the connection handle and the receiver the transport should
    /// drain; the receiver stream ending means the registry replaced or
    /// evicted the connection and the transport must close the socket. Any
    /// prior connection for the user is dropped here (last-connection-wins).
    pub fn connect(&self, user_id: i64) -> (ConnectionId, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        let id = ConnectionId(Uuid::new_v4());

        let replaced = {
            let mut connections = self.lock();
            connections.insert(user_id, Connection { id, tx }).is_some()
        };

        if replaced {
            tracing::debug!("Replaced live connection for user {}", user_id);
        } else {
            tracing::debug!("Registered live connection for user {}", user_id);
        }

        (id, rx)
    }

    /// Remove a connection.
    ///
    /// The handle must still match: a disconnect racing a newer connect for
    /// the same user must not evict the newer connection. Returns whether
    /// anything was removed.
    pub fn disconnect(&self, user_id: i64, id: ConnectionId) -> bool {
        let mut connections = self.lock();
        match connections.get(&user_id) {
            Some(existing) if existing.id == id => {
                connections.remove(&user_id);
                tracing::debug!("Disconnected user {}", user_id);
                true
            }
            _ => false,
        }
    }

    /// Push a signal to a user's live connection, if any.
    ///
    /// Uses a non-blocking send: a connection that is gone or has a full
    /// buffer is evicted on the spot and the failure is never surfaced to
    /// the event publisher.
    pub fn push(&self, user_id: i64, event: PushEvent) -> PushOutcome {
        let mut connections = self.lock();

        let Some(connection) = connections.get(&user_id) else {
            return PushOutcome::NotConnected;
        };

        match connection.tx.try_send(event) {
            Ok(()) => PushOutcome::Delivered,
            Err(e) => {
                tracing::debug!("Evicting stale connection for user {}: {}", user_id, e);
                connections.remove(&user_id);
                PushOutcome::NotConnected
            }
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether any connection is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Connection>> {
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_push() {
        let registry = ConnectionRegistry::new();
        let (_id, mut rx) = registry.connect(5);

        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::Delivered);
        assert_eq!(rx.try_recv().unwrap(), PushEvent::MealReady);
    }

    #[test]
    fn test_push_without_connection() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::NotConnected);
    }

    #[test]
    fn test_reconnect_replaces_old_connection() {
        // A second connect closes the first: its receiver stream ends, only
        // the new connection sees pushes.
        let registry = ConnectionRegistry::new();
        let (_h1, mut rx1) = registry.connect(5);
        let (_h2, mut rx2) = registry.connect(5);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::Delivered);

        assert!(matches!(
            rx1.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(rx2.try_recv().unwrap(), PushEvent::MealReady);
    }

    #[test]
    fn test_stale_disconnect_keeps_new_connection() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = registry.connect(5);
        let (_h2, _rx2) = registry.connect(5);

        assert!(!registry.disconnect(5, h1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disconnect_removes_connection() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.connect(5);

        assert!(registry.disconnect(5, id));
        assert!(registry.is_empty());
        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::NotConnected);
    }

    #[test]
    fn test_failed_push_evicts_mapping() {
        let registry = ConnectionRegistry::new();
        let (_id, rx) = registry.connect(5);
        drop(rx); // Transport went away without disconnecting.

        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::NotConnected);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_full_buffer_evicts_mapping() {
        let registry = ConnectionRegistry::new();
        let (_id, _rx) = registry.connect(5);

        for _ in 0..PUSH_BUFFER {
            assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::Delivered);
        }
        // Receiver never drained: the next push must not block, it evicts.
        assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::NotConnected);
        assert!(registry.is_empty());
    }
}
