//! Scheduler implementation
//!
//! One tick drives the recurring per-user cycle: expired results are removed
//! and announced, parked retries move back onto the job queue, and every due
//! trigger is claimed, dispatched, and re-armed for its next window.
//!
//! The tick body is one sequential loop on a skipping interval, so two ticks
//! never overlap in a process. Across replicas, claiming a due or expiring
//! user is a `ZREM` on the shared index: exactly one claimant wins, so no
//! `(user, window)` is dispatched twice by competing schedulers.

use crate::observability::MealqMetrics;
use crate::storage::TriggerStore;
use crate::trigger::{GenerationJob, MealTrigger};
use crate::windows;
use crate::{config, Error, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Counts from one tick invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Expired results deleted and announced
    pub expired: usize,
    /// Retry envelopes moved back onto the job queue
    pub retried: usize,
    /// Due triggers dispatched and re-armed
    pub dispatched: usize,
    /// Users whose processing failed this tick
    pub failed: usize,
}

impl TickStats {
    /// Whether the tick did any work.
    pub fn is_idle(&self) -> bool {
        *self == TickStats::default()
    }
}

/// Scheduler - drives expiry, retry drain, and due-trigger dispatch
pub struct Scheduler {
    store: TriggerStore,
    metrics: Option<Arc<MealqMetrics>>,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a new scheduler
    #[must_use]
    pub fn new(store: TriggerStore) -> Self {
        Self {
            store,
            metrics: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach a metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Option<Arc<MealqMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get a handle to the shutdown flag
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Run the scheduler loop until shutdown.
    ///
    /// Single-flight by construction: ticks run back-to-back on one task and
    /// a tick that overruns the period makes the interval skip, never stack.
    pub async fn run(&self) -> Result<()> {
        let period = Duration::from_secs(config::get_tick_interval_secs());
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Scheduler started (tick every {:?})", period);

        while !self.shutdown.load(Ordering::Relaxed) {
            interval.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let started = std::time::Instant::now();
            let stats = self.tick(Utc::now()).await;

            if let Some(metrics) = &self.metrics {
                metrics.observe_tick(started.elapsed(), &stats);
            }
            if !stats.is_idle() {
                tracing::info!(
                    "Tick: {} expired, {} retried, {} dispatched, {} failed",
                    stats.expired,
                    stats.retried,
                    stats.dispatched,
                    stats.failed
                );
            }
        }

        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Run one tick at the given instant.
    ///
    /// A failure on one user never aborts the rest of the batch; failed
    /// users stay indexed and the next tick picks them up again.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickStats {
        let mut stats = TickStats::default();

        self.expire_pass(now, &mut stats).await;
        self.drain_retries(now, &mut stats).await;
        self.dispatch_pass(now, &mut stats).await;

        stats
    }

    /// Delete results whose deferred-deletion deadline has passed and tell
    /// the affected users to refresh.
    async fn expire_pass(&self, now: DateTime<Utc>, stats: &mut TickStats) {
        let users = match self.store.expiry_due(now).await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Expiry scan failed: {}", e);
                return;
            }
        };

        for user_id in users {
            match self.expire_one(user_id, now).await {
                Ok(true) => stats.expired += 1,
                Ok(false) => {}
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("Expiry failed for user {}: {}", user_id, e);
                }
            }
        }
    }

    async fn expire_one(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
        if !self.store.claim_expiry(user_id).await? {
            // Another replica claimed this deadline.
            return Ok(false);
        }

        let Some(mut trigger) = self.store.load_trigger(user_id).await? else {
            tracing::warn!("Dangling expiry entry for user {} with no trigger", user_id);
            return Ok(false);
        };

        let Some(pending) = trigger.pending_delete_result_id.clone() else {
            return Ok(false);
        };

        // The trigger may carry a later deadline than the one this index
        // entry was claimed under; the result stays until that passes.
        if let Some(end) = trigger.window_end_at {
            if end > now {
                self.store.mark_expiry(user_id, end).await?;
                return Ok(false);
            }
        }

        if let Err(e) = self.delete_expired(&mut trigger, &pending).await {
            // Put the claim back so the next tick retries the deletion.
            let deadline = trigger.window_end_at.unwrap_or(now);
            if let Err(re) = self.store.mark_expiry(user_id, deadline).await {
                tracing::error!("Failed to re-index expiry for user {}: {}", user_id, re);
            }
            return Err(e);
        }

        tracing::info!("Expired result {} for user {}", pending, user_id);
        Ok(true)
    }

    async fn delete_expired(&self, trigger: &mut MealTrigger, pending: &str) -> Result<()> {
        self.store.delete_result(trigger.user_id, pending).await?;

        // Clients with the deleted result cached must refresh even though no
        // replacement exists yet. Publishing before the trigger is cleared
        // keeps a mid-flight failure replayable: the next tick deletes the
        // already-gone result again and re-publishes, both idempotent.
        self.store.publish_invalidated(trigger.user_id).await?;

        trigger.pending_delete_result_id = None;
        trigger.window_end_at = None;
        self.store.save_trigger(trigger).await
    }

    /// Move parked retries whose backoff has elapsed back onto the job queue.
    async fn drain_retries(&self, now: DateTime<Utc>, stats: &mut TickStats) {
        let envelopes = match self.store.due_job_retries(now).await {
            Ok(envelopes) => envelopes,
            Err(e) => {
                tracing::error!("Retry scan failed: {}", e);
                return;
            }
        };

        for envelope in envelopes {
            match self.store.requeue_retry(&envelope).await {
                Ok(true) => stats.retried += 1,
                Ok(false) => {}
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("Retry requeue failed: {}", e);
                }
            }
        }
    }

    /// Claim, dispatch, and re-arm every due trigger.
    async fn dispatch_pass(&self, now: DateTime<Utc>, stats: &mut TickStats) {
        let users = match self.store.due_users(now).await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Due scan failed: {}", e);
                return;
            }
        };

        for user_id in users {
            match self.dispatch_one(user_id, now).await {
                Ok(true) => stats.dispatched += 1,
                Ok(false) => {}
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("Dispatch failed for user {}: {}", user_id, e);
                }
            }
        }
    }

    async fn dispatch_one(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
        if !self.store.claim_due(user_id).await? {
            // Another replica claimed this trigger.
            return Ok(false);
        }

        let Some(mut trigger) = self.store.load_trigger(user_id).await? else {
            tracing::warn!("Dangling due entry for user {} with no trigger", user_id);
            return Ok(false);
        };
        let claimed_run_at = trigger.next_run_at;

        match self.process_claimed(&mut trigger, now).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() || matches!(e, Error::PreferencesNotFound(_)) => {
                // A user whose schedule cannot be computed is a configuration
                // bug; re-arming would fail identically every tick.
                tracing::error!("Unschedulable user {}: {}", user_id, e);
                Err(e)
            }
            Err(e) => {
                // Transient: surrender the claim so the next tick retries.
                if let Err(re) = self.store.schedule(user_id, claimed_run_at).await {
                    tracing::error!("Failed to re-arm user {}: {}", user_id, re);
                }
                Err(e)
            }
        }
    }

    async fn process_claimed(&self, trigger: &mut MealTrigger, now: DateTime<Utc>) -> Result<()> {
        let prefs = self
            .store
            .load_prefs(trigger.user_id)
            .await?
            .ok_or(Error::PreferencesNotFound(trigger.user_id))?;

        let window = trigger.next_window;

        // The result being superseded survives until the window about to be
        // generated truly opens (un-jittered boundary).
        trigger.window_end_at = Some(windows::window_end(&prefs, window, now));
        trigger.pending_delete_result_id = trigger.current_result_id.clone();
        self.store.save_trigger(trigger).await?;

        if trigger.pending_delete_result_id.is_some() {
            if let Some(end) = trigger.window_end_at {
                self.store.mark_expiry(trigger.user_id, end).await?;
            }
        }

        self.store
            .enqueue_job(&GenerationJob::new(trigger.user_id, window))
            .await?;

        let (next_run_at, next_window) = windows::next_run(&prefs, window, now);
        trigger.next_run_at = next_run_at;
        trigger.next_window = next_window;
        self.store.save_trigger(trigger).await?;
        self.store.schedule(trigger.user_id, next_run_at).await?;

        tracing::debug!(
            "Dispatched {} for user {}, next run {} ({})",
            window,
            trigger.user_id,
            next_run_at.to_rfc3339(),
            next_window
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_stats_idle() {
        assert!(TickStats::default().is_idle());
        let stats = TickStats {
            dispatched: 1,
            ..TickStats::default()
        };
        assert!(!stats.is_idle());
    }
}
