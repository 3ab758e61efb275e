//! Worker implementation
//!
//! Workers are the processing units that dequeue generation jobs and run
//! them against the collaborators. Jobs arrive at-least-once; a worker that
//! receives a duplicate simply regenerates and the trigger converges to the
//! later write.

use crate::generate::Generator;
use crate::observability::MealqMetrics;
use crate::server::config::ServerState;
use crate::storage::Keys;
use crate::trigger::GenerationJob;
use crate::{config, Error, Result};
use chrono::Utc;
use fred::prelude::RedisKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Worker - generation job processing unit
pub struct Worker {
    /// Unique worker ID
    pub id: String,

    /// Shared server state
    state: Arc<ServerState>,

    /// Shutdown flag
    shutdown: Arc<AtomicBool>,

    /// Job executor
    generator: Arc<Generator>,

    /// Metrics collector
    metrics: Option<Arc<MealqMetrics>>,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        id: String,
        state: Arc<ServerState>,
        shutdown: Arc<AtomicBool>,
        generator: Arc<Generator>,
        metrics: Option<Arc<MealqMetrics>>,
    ) -> Self {
        Self {
            id,
            state,
            shutdown,
            generator,
            metrics,
        }
    }

    /// Run the worker: register, heartbeat, process jobs, unregister.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Worker {} starting", self.id);

        self.register().await?;
        let heartbeat = self.start_heartbeat();

        let result = self.job_loop().await;

        if let Err(e) = self.unregister().await {
            tracing::error!("Failed to unregister worker: {}", e);
        }
        heartbeat.abort();

        tracing::info!("Worker {} stopped", self.id);
        result
    }

    /// Register worker in Redis
    async fn register(&self) -> Result<()> {
        let workers_key: RedisKey = Keys::meta_workers().into();
        self.state
            .redis
            .sadd(workers_key, self.id.as_str().into())
            .await?;
        self.update_heartbeat().await?;

        tracing::debug!("Worker {} registered", self.id);
        Ok(())
    }

    /// Unregister worker from Redis
    async fn unregister(&self) -> Result<()> {
        let workers_key: RedisKey = Keys::meta_workers().into();
        self.state
            .redis
            .srem(workers_key, self.id.as_str().into())
            .await?;

        let heartbeat_key: RedisKey = Keys::meta_heartbeat(&self.id).into();
        self.state.redis.del(vec![heartbeat_key]).await?;

        tracing::debug!("Worker {} unregistered", self.id);
        Ok(())
    }

    /// Start the heartbeat task
    fn start_heartbeat(&self) -> JoinHandle<()> {
        let id = self.id.clone();
        let redis = self.state.redis.clone();
        let interval = Duration::from_secs(self.state.config.heartbeat_interval);
        let worker_timeout = self.state.config.worker_timeout;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;

                let heartbeat_key: RedisKey = Keys::meta_heartbeat(&id).into();
                let now = Utc::now().timestamp();
                let update = async {
                    redis.set(heartbeat_key.clone(), now.to_string().into()).await?;
                    redis.expire(heartbeat_key, worker_timeout).await
                };
                if let Err(e) = update.await {
                    tracing::error!("Heartbeat update failed: {}", e);
                }
            }
        })
    }

    /// Write one heartbeat with its liveness TTL
    async fn update_heartbeat(&self) -> Result<()> {
        let heartbeat_key: RedisKey = Keys::meta_heartbeat(&self.id).into();
        let now = Utc::now().timestamp();
        self.state
            .redis
            .set(heartbeat_key.clone(), now.to_string().into())
            .await?;
        self.state
            .redis
            .expire(heartbeat_key, self.state.config.worker_timeout)
            .await?;
        Ok(())
    }

    /// Main job processing loop
    async fn job_loop(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self
                .state
                .store
                .dequeue_job(self.state.config.dequeue_timeout)
                .await
            {
                Ok(Some(job)) => {
                    self.process_job(job).await;
                }
                Ok(None) => {
                    // BLPOP timed out with an empty queue; loop re-checks shutdown.
                }
                Err(e) => {
                    let message = e.to_string();
                    if message.contains("Timeout") || message.contains("timed out") {
                        tracing::debug!("Job queue empty, waiting for jobs...");
                    } else {
                        tracing::warn!("Dequeue error: {}", e);
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Ok(())
    }

    /// Process one job: run the generator under the configured timeout, then
    /// retry with backoff or abandon on failure.
    async fn process_job(&self, mut job: GenerationJob) {
        tracing::debug!("Processing {}", job.description());

        let timeout = Duration::from_secs(config::get_default_job_timeout_secs());
        let outcome = tokio::time::timeout(timeout, self.generator.run(&job)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "generation for user {} timed out after {:?}",
                job.user_id, timeout
            ))),
        };

        match result {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.job_processed();
                }
            }
            Err(e) => {
                job.last_error = Some(e.to_string());
                job.retry_cnt += 1;

                if e.is_retryable() && job.can_retry() {
                    if let Some(metrics) = &self.metrics {
                        metrics.job_retried();
                    }
                    let delay = job.retry_delay().unwrap_or(Duration::from_secs(2));
                    if let Err(re) = self.state.store.schedule_job_retry(&job, delay).await {
                        tracing::error!("Failed to park {} for retry: {}", job.description(), re);
                    } else {
                        tracing::warn!(
                            "{} failed ({}), retrying in {:?}",
                            job.description(),
                            e,
                            delay
                        );
                    }
                } else {
                    if let Some(metrics) = &self.metrics {
                        metrics.job_failed();
                    }
                    // No result for this window; the next scheduled window
                    // regenerates on its own.
                    tracing::error!("Abandoning {}: {}", job.description(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // Worker behavior is covered by the Redis-gated lifecycle tests; the
    // retry arithmetic it relies on lives in trigger::tests.
}
