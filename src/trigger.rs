//! Scheduling record definitions
//!
//! Provides the per-user trigger, the stored meal result, and the generation
//! job envelope that flows through the job queue.

use crate::config;
use crate::windows::MealWindow;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-user recurring scheduling record. Exactly one exists per user.
///
/// The trigger is created at registration and never deleted while the user
/// exists; only the scheduler tick and generation jobs mutate it. Deletion
/// state (`pending_delete_result_id` / `window_end_at`) is tracked alongside
/// but independent of the dispatch cycle, so cleanup never blocks dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealTrigger {
    /// Owning user id
    pub user_id: i64,
    /// When the next generation run fires
    pub next_run_at: DateTime<Utc>,
    /// Which window that run generates
    pub next_window: MealWindow,
    /// The result currently served to the user
    pub current_result_id: Option<String>,
    /// A superseded result awaiting deferred deletion
    pub pending_delete_result_id: Option<String>,
    /// When the pending result becomes safe to delete
    pub window_end_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl MealTrigger {
    /// Create a fresh trigger anchored to its first scheduled run.
    #[must_use]
    pub fn new(user_id: i64, next_run_at: DateTime<Utc>, next_window: MealWindow) -> Self {
        Self {
            user_id,
            next_run_at,
            next_window,
            current_result_id: None,
            pending_delete_result_id: None,
            window_end_at: None,
            created_at: Utc::now(),
        }
    }

    /// Short description for logs
    pub fn description(&self) -> String {
        format!(
            "Trigger[user={}, next_run={}, window={}]",
            self.user_id,
            self.next_run_at.to_rfc3339(),
            self.next_window
        )
    }
}

/// One generated meal recommendation set for a specific user and window.
///
/// Immutable once written: created only by a generation job, removed only by
/// the scheduler tick once its deferred-deletion deadline passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealResult {
    /// Result id (UUID)
    pub id: String,
    /// Owning user id
    pub user_id: i64,
    /// Window this result was generated for
    pub window: MealWindow,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Serialized recommendation payload (JSON)
    pub payload: String,
    /// Whether the user already acted on this result
    pub consumed: bool,
}

impl MealResult {
    /// Create a new result with a fresh id.
    #[must_use]
    pub fn new(user_id: i64, window: MealWindow, payload: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            window,
            generated_at: Utc::now(),
            payload,
            consumed: false,
        }
    }

    /// Validate the result before persisting it.
    pub fn validate(&self) -> Result<()> {
        if self.payload.is_empty() {
            return Err(Error::Validation("result payload cannot be empty".into()));
        }

        let max_payload_size = config::get_max_payload_size();
        if self.payload.len() > max_payload_size {
            return Err(Error::Validation(format!(
                "result payload exceeds {}KB limit (got {}B)",
                max_payload_size / 1024,
                self.payload.len()
            )));
        }

        Ok(())
    }
}

/// Job envelope dispatched to the generation worker pool.
///
/// Delivery is at-least-once: a tick crash between dispatch and reschedule
/// may produce a duplicate for the same (user, window), so processing must
/// converge under duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Target user id
    #[serde(rename = "userId")]
    pub user_id: i64,
    /// Window index to generate (0-3)
    #[serde(rename = "windowIndex")]
    pub window_index: u8,
    /// Current retry count
    #[serde(default, rename = "retryCnt")]
    pub retry_cnt: u32,
    /// Last error message
    #[serde(default, rename = "lastError")]
    pub last_error: Option<String>,
}

impl GenerationJob {
    /// Create a new job for a user and window.
    #[must_use]
    pub fn new(user_id: i64, window: MealWindow) -> Self {
        Self {
            user_id,
            window_index: window.index(),
            retry_cnt: 0,
            last_error: None,
        }
    }

    /// The window this job generates.
    pub fn window(&self) -> Result<MealWindow> {
        MealWindow::from_index(self.window_index)
            .ok_or_else(|| Error::Validation(format!("invalid window index {}", self.window_index)))
    }

    /// Check if the job can be retried.
    pub fn can_retry(&self) -> bool {
        self.retry_cnt < config::get_default_max_retry()
    }

    /// Calculate the next retry delay (exponential backoff)
    pub fn retry_delay(&self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }

        // Exponential backoff: 2^(retry_cnt+1) seconds, capped at 64 seconds
        let delay_secs = 2u64.pow(self.retry_cnt.saturating_add(1).min(6));
        Some(Duration::from_secs(delay_secs))
    }

    /// Short description for logs
    pub fn description(&self) -> String {
        format!(
            "Job[user={}, window={}, retries={}]",
            self.user_id, self.window_index, self.retry_cnt
        )
    }
}
