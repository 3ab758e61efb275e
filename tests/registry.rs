//! Connection registry scenarios
//!
//! Last-connection-wins replacement, eviction of dead connections, and
//! behavior under many concurrent connect/disconnect calls with a pushing
//! consumer.

use mealq::notify::{ConnectionRegistry, PushEvent, PushOutcome};
use std::sync::Arc;

#[test]
fn reconnect_closes_prior_socket() {
    // User 5 connects twice without disconnecting: the first receiver ends,
    // only the second connection sees subsequent pushes.
    let registry = ConnectionRegistry::new();

    let (_h1, mut rx1) = registry.connect(5);
    let (_h2, mut rx2) = registry.connect(5);
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.push(5, PushEvent::MealReady), PushOutcome::Delivered);

    assert!(matches!(
        rx1.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
    assert_eq!(rx2.try_recv().unwrap(), PushEvent::MealReady);
}

#[test]
fn push_to_dropped_receiver_evicts_entry() {
    let registry = ConnectionRegistry::new();
    let (_handle, rx) = registry.connect(9);
    drop(rx);

    // First push discovers the dead connection and evicts it silently.
    assert_eq!(registry.push(9, PushEvent::MealReady), PushOutcome::NotConnected);
    assert!(registry.is_empty());

    // Later events see a plain not-connected user, no stale reference.
    assert_eq!(registry.push(9, PushEvent::MealInvalidated), PushOutcome::NotConnected);
}

#[test]
fn duplicate_events_are_idempotent_signals() {
    // At-least-once delivery means the same event can arrive twice; both
    // pushes deliver the identical content-free signal.
    let registry = ConnectionRegistry::new();
    let (_handle, mut rx) = registry.connect(3);

    registry.push(3, PushEvent::MealReady);
    registry.push(3, PushEvent::MealReady);

    assert_eq!(rx.try_recv().unwrap(), PushEvent::MealReady);
    assert_eq!(rx.try_recv().unwrap(), PushEvent::MealReady);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_connects_leave_one_connection_per_user() {
    let registry = Arc::new(ConnectionRegistry::new());
    let users = 8i64;
    let rounds = 50;

    let mut handles = Vec::new();
    for user_id in 0..users {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..rounds {
                let (handle, _rx) = registry.connect(user_id);
                tokio::task::yield_now().await;
                // Half the rounds disconnect cleanly, half just drop.
                if user_id % 2 == 0 {
                    registry.disconnect(user_id, handle);
                }
            }
        }));
    }

    // A consumer pushing throughout must never block or panic, whatever
    // state each mapping is in at that instant.
    let pusher = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for round in 0..rounds {
                for user_id in 0..users {
                    let _ = registry.push(user_id, PushEvent::MealReady);
                }
                if round % 8 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    pusher.await.unwrap();

    // After the churn settles, a fresh connect per user leaves exactly one
    // served mapping each.
    let mut receivers = Vec::new();
    for user_id in 0..users {
        receivers.push(registry.connect(user_id));
    }
    assert_eq!(registry.len(), users as usize);

    for (user_id, (_handle, rx)) in (0..users).zip(receivers.iter_mut()) {
        assert_eq!(registry.push(user_id, PushEvent::MealReady), PushOutcome::Delivered);
        assert_eq!(rx.try_recv().unwrap(), PushEvent::MealReady);
    }
}
