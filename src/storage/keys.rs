//! Redis Key manager
//!
//! Provides unified Redis key naming convention.

/// Redis Key prefix
const PREFIX: &str = "mealq";

/// Redis Key manager
#[derive(Debug, Clone)]
pub struct Keys;

impl Keys {
    /// Due-trigger index Key (ZSet: member = user id, score = next run)
    /// Example: mealq:due
    pub fn due() -> String {
        format!("{}:due", PREFIX)
    }

    /// Deferred-deletion index Key (ZSet: member = user id, score = window end)
    /// Example: mealq:expiry
    pub fn expiry() -> String {
        format!("{}:expiry", PREFIX)
    }

    /// Trigger record Key (String, msgpack)
    /// Example: mealq:trigger:42
    pub fn trigger(user_id: i64) -> String {
        format!("{}:trigger:{}", PREFIX, user_id)
    }

    /// Meal preference record Key (String, msgpack)
    /// Example: mealq:prefs:42
    pub fn prefs(user_id: i64) -> String {
        format!("{}:prefs:{}", PREFIX, user_id)
    }

    /// Stored result Key (String, msgpack)
    /// Example: mealq:result:a1b2c3d4-...
    pub fn result(result_id: &str) -> String {
        format!("{}:result:{}", PREFIX, result_id)
    }

    /// Per-user result membership Key (Set of result ids)
    /// Example: mealq:results:42
    pub fn results(user_id: i64) -> String {
        format!("{}:results:{}", PREFIX, user_id)
    }

    /// Generation job queue Key (List of JSON envelopes)
    pub fn jobs() -> String {
        format!("{}:jobs", PREFIX)
    }

    /// Generation retry queue Key (ZSet: member = JSON envelope, score = due time)
    pub fn retry() -> String {
        format!("{}:retry", PREFIX)
    }

    /// All workers set Key (Set)
    pub fn meta_workers() -> String {
        format!("{}:meta:workers", PREFIX)
    }

    /// Worker heartbeat Key (String)
    /// Example: mealq:meta:heartbeat:worker-1
    pub fn meta_heartbeat(worker_id: &str) -> String {
        format!("{}:meta:heartbeat:{}", PREFIX, worker_id)
    }

    /// Pub/sub channel for freshly generated results
    pub fn generated_channel() -> &'static str {
        "mealGenerated"
    }

    /// Pub/sub channel for expired-result invalidations
    pub fn invalidated_channel() -> &'static str {
        "mealInvalidated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(Keys::due(), "mealq:due");
        assert_eq!(Keys::expiry(), "mealq:expiry");
        assert_eq!(Keys::trigger(42), "mealq:trigger:42");
        assert_eq!(Keys::prefs(42), "mealq:prefs:42");
        assert_eq!(Keys::result("abc123"), "mealq:result:abc123");
        assert_eq!(Keys::results(42), "mealq:results:42");
        assert_eq!(Keys::jobs(), "mealq:jobs");
        assert_eq!(Keys::retry(), "mealq:retry");
        assert_eq!(Keys::meta_workers(), "mealq:meta:workers");
        assert_eq!(Keys::meta_heartbeat("worker-1"), "mealq:meta:heartbeat:worker-1");
        assert_eq!(Keys::generated_channel(), "mealGenerated");
        assert_eq!(Keys::invalidated_channel(), "mealInvalidated");
    }
}
