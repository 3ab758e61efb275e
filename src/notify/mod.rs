//! Live notification relay
//!
//! Bridges the Redis event channels to per-user live connections: a single
//! consumer task receives `mealGenerated` / `mealInvalidated` events and the
//! connection registry pushes a content-free signal to the user's socket.
//! Clients re-fetch on receipt; no payload travels inline.

pub mod consumer;
pub mod registry;

pub use consumer::NotifyConsumer;
pub use registry::{ConnectionId, ConnectionRegistry, PushOutcome};

use serde::{Deserialize, Serialize};

/// Content-free signal pushed to a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PushEvent {
    /// Fresh meal suggestions are ready; re-fetch.
    #[serde(rename = "meal_ready")]
    MealReady,
    /// A stale result was removed; re-fetch to drop local state.
    #[serde(rename = "meal_invalidated")]
    MealInvalidated,
}

/// Wire payload of the Redis event channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEvent {
    /// Affected user id
    #[serde(rename = "userId")]
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_event_wire_format() {
        let ready = serde_json::to_string(&PushEvent::MealReady).unwrap();
        assert_eq!(ready, "{\"event\":\"meal_ready\"}");

        let invalidated = serde_json::to_string(&PushEvent::MealInvalidated).unwrap();
        assert_eq!(invalidated, "{\"event\":\"meal_invalidated\"}");
    }

    #[test]
    fn test_user_event_wire_format() {
        let event: UserEvent = serde_json::from_str("{\"userId\": 5}").unwrap();
        assert_eq!(event.user_id, 5);
    }
}
