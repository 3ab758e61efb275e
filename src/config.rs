//! mealq global configuration module
//!
//! Provides centralized configuration for scheduling intervals, retry limits,
//! and other system-wide settings.

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// mealq global configuration
///
/// Contains system-wide settings for the scheduler tick, generation jobs,
/// and stored result lifetimes.
#[derive(Debug, Clone)]
pub struct MealqConfig {
    /// Scheduler tick period in seconds (default: 60)
    pub tick_interval_secs: u64,

    /// Default maximum retry count for generation jobs (default: 3)
    pub default_max_retry: u32,

    /// Default timeout for a single generation job in seconds (default: 120)
    pub default_job_timeout_secs: u64,

    /// Upper bound (exclusive) for the per-user jitter offset in minutes (default: 30)
    pub offset_jitter_minutes: u32,

    /// Safety-net TTL in seconds for stored results (default: 7 days).
    /// Deletion is driven by the trigger's pending-delete pointer; the TTL only
    /// drains orphaned rows left behind by duplicate at-least-once dispatch.
    pub result_ttl: u64,

    /// Maximum serialized result payload size in bytes (default: 256KB)
    pub max_payload_size: usize,
}

impl Default for MealqConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            default_max_retry: 3,
            default_job_timeout_secs: 120,
            offset_jitter_minutes: 30,
            result_ttl: 7 * 86400,
            max_payload_size: 256 * 1024,
        }
    }
}

impl MealqConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheduler tick period
    #[must_use]
    pub fn with_tick_interval(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    /// Set default max retry count
    #[must_use]
    pub fn with_default_max_retry(mut self, max_retry: u32) -> Self {
        self.default_max_retry = max_retry;
        self
    }

    /// Set default generation job timeout
    #[must_use]
    pub fn with_job_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_job_timeout_secs = timeout_secs;
        self
    }

    /// Set the jitter offset upper bound
    #[must_use]
    pub fn with_offset_jitter(mut self, minutes: u32) -> Self {
        self.offset_jitter_minutes = minutes;
        self
    }

    /// Set the result safety-net TTL
    #[must_use]
    pub fn with_result_ttl(mut self, ttl_secs: u64) -> Self {
        self.result_ttl = ttl_secs;
        self
    }

    /// Set maximum payload size
    #[must_use]
    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_secs == 0 {
            return Err("tick_interval_secs must be greater than 0".into());
        }
        if self.offset_jitter_minutes > 60 {
            return Err(format!(
                "offset_jitter_minutes must be at most 60, got {}",
                self.offset_jitter_minutes
            ));
        }
        Ok(())
    }
}

/// Thread-safe global configuration storage
static GLOBAL_CONFIG: Lazy<RwLock<MealqConfig>> =
    Lazy::new(|| RwLock::new(MealqConfig::default()));

/// Get the current global configuration
pub fn get_config() -> MealqConfig {
    GLOBAL_CONFIG
        .read()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to read global config: {}", e);
            std::process::exit(1);
        })
        .clone()
}

/// Set the global configuration
pub fn set_config(config: MealqConfig) {
    let mut global = GLOBAL_CONFIG.write().unwrap_or_else(|e| {
        tracing::error!("Failed to write global config: {}", e);
        std::process::exit(1);
    });
    *global = config;
    tracing::info!("Global mealq configuration updated");
}

/// Update the global configuration with a modifier function
///
/// Useful for making partial changes to the configuration. The modifier
/// receives a mutable reference; the write lock is held for the duration of
/// the call.
pub fn update_config<F>(modifier: F)
where
    F: FnOnce(&mut MealqConfig),
{
    let mut global = GLOBAL_CONFIG.write().unwrap_or_else(|e| {
        tracing::error!("Failed to write global config: {}", e);
        std::process::exit(1);
    });

    modifier(&mut global);

    tracing::info!("Global mealq configuration updated");
}

/// Get the scheduler tick period in seconds
pub fn get_tick_interval_secs() -> u64 {
    get_config().tick_interval_secs
}

/// Get the default max retry count
pub fn get_default_max_retry() -> u32 {
    get_config().default_max_retry
}

/// Get the default generation job timeout in seconds
pub fn get_default_job_timeout_secs() -> u64 {
    get_config().default_job_timeout_secs
}

/// Get the jitter offset upper bound in minutes
pub fn get_offset_jitter_minutes() -> u32 {
    get_config().offset_jitter_minutes
}

/// Get the result safety-net TTL in seconds
pub fn get_result_ttl() -> u64 {
    get_config().result_ttl
}

/// Get the maximum payload size in bytes
pub fn get_max_payload_size() -> usize {
    get_config().max_payload_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests that modify global config run serially
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = MealqConfig::default();
        assert_eq!(config.tick_interval_secs, 60);
        assert_eq!(config.default_max_retry, 3);
        assert_eq!(config.default_job_timeout_secs, 120);
        assert_eq!(config.offset_jitter_minutes, 30);
        assert_eq!(config.result_ttl, 7 * 86400);
    }

    #[test]
    fn test_config_builder() {
        let config = MealqConfig::new()
            .with_tick_interval(30)
            .with_default_max_retry(5)
            .with_job_timeout(60)
            .with_offset_jitter(15)
            .with_result_ttl(3600)
            .with_max_payload_size(1024);

        assert_eq!(config.tick_interval_secs, 30);
        assert_eq!(config.default_max_retry, 5);
        assert_eq!(config.default_job_timeout_secs, 60);
        assert_eq!(config.offset_jitter_minutes, 15);
        assert_eq!(config.result_ttl, 3600);
        assert_eq!(config.max_payload_size, 1024);
    }

    #[test]
    fn test_validate() {
        assert!(MealqConfig::default().validate().is_ok());
        assert!(MealqConfig::new().with_tick_interval(0).validate().is_err());
        assert!(MealqConfig::new().with_offset_jitter(90).validate().is_err());
    }

    #[test]
    fn test_global_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        let original = get_config();

        set_config(MealqConfig::new().with_tick_interval(15));
        assert_eq!(get_tick_interval_secs(), 15);

        update_config(|c| {
            c.default_max_retry = 7;
        });
        assert_eq!(get_default_max_retry(), 7);
        assert_eq!(get_tick_interval_secs(), 15); // Should be preserved

        set_config(original);
    }
}
