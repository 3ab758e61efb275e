//! Prometheus metrics collector for mealq
//!
//! Provides scheduling and generation metrics for monitoring.

use crate::server::scheduler::TickStats;
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;

/// mealq metrics collector
///
/// Collects metrics for the scheduler tick, trigger dispatch, result expiry,
/// and generation job outcomes.
#[derive(Clone)]
pub struct MealqMetrics {
    registry: Arc<Registry>,

    // Tick metrics
    ticks_total: IntCounter,
    tick_duration_seconds: Histogram,
    tick_failures_total: IntCounter,

    // Scheduling counters
    triggers_dispatched_total: IntCounter,
    results_expired_total: IntCounter,
    jobs_requeued_total: IntCounter,

    // Generation counters
    jobs_processed_total: IntCounter,
    jobs_retried_total: IntCounter,
    jobs_failed_total: IntCounter,
}

impl MealqMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = IntCounter::with_opts(Opts::new(
            "mealq_ticks_total",
            "Total number of scheduler ticks",
        ))?;
        let tick_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "mealq_tick_duration_seconds",
            "Scheduler tick duration in seconds",
        ))?;
        let tick_failures_total = IntCounter::with_opts(Opts::new(
            "mealq_tick_failures_total",
            "Total number of per-user failures inside ticks",
        ))?;

        let triggers_dispatched_total = IntCounter::with_opts(Opts::new(
            "mealq_triggers_dispatched_total",
            "Total number of due triggers dispatched",
        ))?;
        let results_expired_total = IntCounter::with_opts(Opts::new(
            "mealq_results_expired_total",
            "Total number of superseded results deleted",
        ))?;
        let jobs_requeued_total = IntCounter::with_opts(Opts::new(
            "mealq_jobs_requeued_total",
            "Total number of retry envelopes moved back onto the job queue",
        ))?;

        let jobs_processed_total = IntCounter::with_opts(Opts::new(
            "mealq_jobs_processed_total",
            "Total number of generation jobs completed successfully",
        ))?;
        let jobs_retried_total = IntCounter::with_opts(Opts::new(
            "mealq_jobs_retried_total",
            "Total number of generation job retries",
        ))?;
        let jobs_failed_total = IntCounter::with_opts(Opts::new(
            "mealq_jobs_failed_total",
            "Total number of generation jobs abandoned",
        ))?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(tick_failures_total.clone()))?;
        registry.register(Box::new(triggers_dispatched_total.clone()))?;
        registry.register(Box::new(results_expired_total.clone()))?;
        registry.register(Box::new(jobs_requeued_total.clone()))?;
        registry.register(Box::new(jobs_processed_total.clone()))?;
        registry.register(Box::new(jobs_retried_total.clone()))?;
        registry.register(Box::new(jobs_failed_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_total,
            tick_duration_seconds,
            tick_failures_total,
            triggers_dispatched_total,
            results_expired_total,
            jobs_requeued_total,
            jobs_processed_total,
            jobs_retried_total,
            jobs_failed_total,
        })
    }

    /// Record one completed tick.
    pub fn observe_tick(&self, duration: Duration, stats: &TickStats) {
        self.ticks_total.inc();
        self.tick_duration_seconds.observe(duration.as_secs_f64());
        self.tick_failures_total.inc_by(stats.failed as u64);
        self.triggers_dispatched_total.inc_by(stats.dispatched as u64);
        self.results_expired_total.inc_by(stats.expired as u64);
        self.jobs_requeued_total.inc_by(stats.retried as u64);
    }

    /// Record one successful generation job.
    pub fn job_processed(&self) {
        self.jobs_processed_total.inc();
    }

    /// Record one generation job retry.
    pub fn job_retried(&self) {
        self.jobs_retried_total.inc();
    }

    /// Record one abandoned generation job.
    pub fn job_failed(&self) {
        self.jobs_failed_total.inc();
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let metrics = MealqMetrics::new().unwrap();

        let stats = TickStats {
            expired: 1,
            retried: 2,
            dispatched: 3,
            failed: 0,
        };
        metrics.observe_tick(Duration::from_millis(5), &stats);
        metrics.job_processed();
        metrics.job_failed();

        let families = metrics.registry().gather();
        assert!(!families.is_empty());

        let dispatched = families
            .iter()
            .find(|f| f.get_name() == "mealq_triggers_dispatched_total")
            .unwrap();
        assert_eq!(dispatched.get_metric()[0].get_counter().get_value(), 3.0);
    }
}
