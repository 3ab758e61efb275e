//! Client builder and registration implementation

use crate::storage::{RedisClient, RedisConfig, TriggerStore};
use crate::trigger::{GenerationJob, MealResult, MealTrigger};
use crate::windows::{self, MealTimes, MealWindow};
use crate::{config, Error, Result};
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Connection pool size
    pub pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            pool_size: 10,
        }
    }
}

/// Client - registration and result access
///
/// The producer side of the cycle: registering a user anchors their trigger
/// to the current window and dispatches the first generation job; afterwards
/// the scheduler keeps the cycle running on its own.
#[derive(Clone)]
pub struct Client {
    store: TriggerStore,
}

impl Client {
    /// Create a new Client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Access the underlying store.
    pub fn store(&self) -> &TriggerStore {
        &self.store
    }

    /// Register a user with default boundaries and a random jitter offset.
    pub async fn register_user(&self, user_id: i64) -> Result<MealTrigger> {
        let jitter_max = config::get_offset_jitter_minutes().max(1);
        let offset = rand::thread_rng().gen_range(0..jitter_max);
        self.register_user_with(user_id, MealTimes::with_offset(offset)).await
    }

    /// Register a user with explicit meal boundaries.
    ///
    /// Creates the preference record and the trigger (exactly one per user),
    /// anchors the trigger to the window after the current one, and enqueues
    /// an immediate generation job for the window the user is in right now.
    pub async fn register_user_with(
        &self,
        user_id: i64,
        times: MealTimes,
    ) -> Result<MealTrigger> {
        if times.offset_minutes >= 60 {
            return Err(Error::Validation(format!(
                "offset_minutes must be under 60, got {}",
                times.offset_minutes
            )));
        }
        if self.store.load_trigger(user_id).await?.is_some() {
            return Err(Error::Validation(format!(
                "user {} is already registered",
                user_id
            )));
        }

        let now = Utc::now();
        self.store.save_prefs(user_id, &times).await?;

        let current = windows::current_window(&times, now);
        let (next_run_at, next_window) = windows::next_run(&times, current, now);

        let trigger = MealTrigger::new(user_id, next_run_at, next_window);
        self.store.create_trigger(&trigger).await?;

        // The user should not wait for the next boundary to see anything:
        // generate for the window they are in right now.
        self.store
            .enqueue_job(&GenerationJob::new(user_id, current))
            .await?;

        tracing::info!(
            "Registered user {} (offset {}m): current {}, next run {} ({})",
            user_id,
            times.offset_minutes,
            current,
            next_run_at.to_rfc3339(),
            next_window
        );
        Ok(trigger)
    }

    /// The user's current unconsumed results, newest per window, in window
    /// order.
    pub async fn current_meals(&self, user_id: i64) -> Result<Vec<MealResult>> {
        let results = self.store.results_for_user(user_id).await?;

        let mut newest: HashMap<MealWindow, MealResult> = HashMap::new();
        for result in results {
            if result.consumed {
                continue;
            }
            match newest.get(&result.window) {
                Some(existing) if existing.generated_at >= result.generated_at => {}
                _ => {
                    newest.insert(result.window, result);
                }
            }
        }

        let mut meals: Vec<MealResult> = newest.into_values().collect();
        meals.sort_by_key(|r| r.window.index());
        Ok(meals)
    }

    /// Mark a result as consumed.
    pub async fn mark_consumed(&self, user_id: i64, result_id: &str) -> Result<()> {
        self.store.mark_consumed(user_id, result_id).await
    }

    /// Enqueue an on-demand generation job for a registered user.
    pub async fn request_generation(&self, user_id: i64, window: MealWindow) -> Result<()> {
        if self.store.load_trigger(user_id).await?.is_none() {
            return Err(Error::TriggerNotFound(user_id));
        }
        self.store
            .enqueue_job(&GenerationJob::new(user_id, window))
            .await
    }

    /// Get inspector
    pub fn inspector(&self) -> super::Inspector {
        super::Inspector::new(self.store.clone())
    }
}

/// Client builder
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Set Redis URL
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    /// Set connection pool size
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Build Client
    pub async fn build(self) -> Result<Client> {
        let redis = RedisClient::new(RedisConfig {
            url: self.config.redis_url,
            pool_size: self.config.pool_size,
        })
        .await?;
        Ok(Client {
            store: TriggerStore::new(redis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let builder = Client::builder()
            .redis_url("redis://localhost:6380")
            .pool_size(20);

        assert_eq!(builder.config.redis_url, "redis://localhost:6380");
        assert_eq!(builder.config.pool_size, 20);
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.pool_size, 10);
    }
}
