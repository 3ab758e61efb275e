//! Client SDK
//!
//! Provides user registration, result access, and scheduling inspection.

pub mod builder;

pub use builder::{Client, ClientBuilder, ClientConfig};

use crate::storage::{StoreStats, TriggerStore};
use crate::trigger::MealTrigger;
use crate::windows::MealTimes;
use crate::Result;

/// Scheduling inspector
///
/// Used to query a user's scheduling state and queue statistics.
pub struct Inspector {
    store: TriggerStore,
}

impl Inspector {
    /// Create a new inspector
    pub fn new(store: TriggerStore) -> Self {
        Self { store }
    }

    /// Get a user's trigger, if registered.
    pub async fn trigger(&self, user_id: i64) -> Result<Option<MealTrigger>> {
        self.store.load_trigger(user_id).await
    }

    /// Get a user's meal preferences, if registered.
    pub async fn preferences(&self, user_id: i64) -> Result<Option<MealTimes>> {
        self.store.load_prefs(user_id).await
    }

    /// Get scheduling and queue statistics.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }
}
