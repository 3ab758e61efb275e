//! Server module
//!
//! Hosts the three moving parts of the recommendation cycle: the scheduler
//! tick, the generation worker pool, and the notification consumer. Any of
//! the three can be disabled per instance, so a deployment can split the
//! roles across processes while sharing one Redis.

pub mod config;
pub mod scheduler;
pub mod worker;

pub use config::{ServerBuilder, ServerConfig, ServerState};
pub use scheduler::{Scheduler, TickStats};
pub use worker::Worker;

use crate::generate::Generator;
use crate::notify::NotifyConsumer;
use crate::observability::MealqMetrics;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Server - runs the scheduler, generation workers, and notifier
///
/// # Example
///
/// ```rust,no_run
/// use mealq::server::{Server, ServerBuilder};
/// use mealq::generate::{PantryItem, PantryProvider};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// # struct InventoryService;
/// # #[async_trait]
/// # impl PantryProvider for InventoryService {
/// #     async fn pantry_snapshot(&self, _user_id: i64) -> mealq::Result<Vec<PantryItem>> {
/// #         Ok(Vec::new())
/// #     }
/// # }
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let state = ServerBuilder::new()
///     .redis_url("redis://localhost:6379")
///     .concurrency(4)
///     .pantry_provider(Arc::new(InventoryService))
///     .build()
///     .await?;
///
/// // Runs until Ctrl+C.
/// Server::from(state).run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    /// Shared state
    state: Arc<ServerState>,

    /// Shutdown flag
    shutdown: Arc<AtomicBool>,

    /// Active worker count
    worker_count: Arc<AtomicUsize>,

    /// Metrics collector
    metrics: Option<Arc<MealqMetrics>>,

    /// Metrics HTTP bind address
    metrics_bind_address: Option<SocketAddr>,
}

impl Server {
    fn new(state: ServerState) -> Self {
        Self {
            state: Arc::new(state),
            shutdown: Arc::new(AtomicBool::new(false)),
            worker_count: Arc::new(AtomicUsize::new(0)),
            metrics: None,
            metrics_bind_address: None,
        }
    }

    /// Enable metrics collection with an HTTP `/metrics` endpoint.
    pub fn enable_metrics(&mut self, bind_address: impl Into<SocketAddr>) -> Result<()> {
        let metrics = MealqMetrics::new().map_err(|e| Error::Config(e.to_string()))?;
        self.metrics = Some(Arc::new(metrics));
        let addr = bind_address.into();
        self.metrics_bind_address = Some(addr);
        tracing::info!("Metrics endpoint: http://{}/metrics", addr);
        Ok(())
    }

    /// Enable metrics collection (accepts a string address).
    pub fn enable_metrics_on(&mut self, bind_address: impl Into<String>) -> Result<()> {
        let addr_str = bind_address.into();
        let addr = addr_str
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("Invalid metrics address '{}': {}", addr_str, e)))?;
        self.enable_metrics(addr)
    }

    /// Run the server until Ctrl+C, then shut down gracefully.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Starting mealq server: {}", self.state.config.server_name);
        tracing::info!(
            "Scheduler: {}, notifier: {}, workers: {}",
            self.state.config.enable_scheduler,
            self.state.config.enable_notifier,
            self.state.config.concurrency
        );

        let mut join_set = JoinSet::new();

        // Metrics HTTP server
        #[cfg(feature = "metrics-http")]
        if let (Some(metrics), Some(bind_address)) =
            (self.metrics.clone(), self.metrics_bind_address)
        {
            use crate::observability::http_server::MetricsServer;
            let metrics_server = MetricsServer::new(metrics, bind_address);
            let metrics_shutdown = self.shutdown.clone();

            tokio::spawn(async move {
                if let Err(e) = metrics_server.run().await {
                    tracing::error!("Metrics server exited: {}", e);
                }
                metrics_shutdown.store(true, Ordering::SeqCst);
            });

            tracing::info!("Metrics HTTP server started on http://{}", bind_address);
        }

        // Scheduler tick
        let scheduler = Arc::new(
            Scheduler::new(self.state.store.clone()).with_metrics(self.metrics.clone()),
        );
        if self.state.config.enable_scheduler {
            let scheduler = scheduler.clone();
            let scheduler_shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                let result = scheduler.run().await;
                // Scheduler exit means this instance can no longer make progress.
                scheduler_shutdown.store(true, Ordering::SeqCst);
                result
            });
            tracing::info!("Scheduler started");
        }

        // Notification consumer
        let consumer = Arc::new(NotifyConsumer::new(
            self.state.redis.clone(),
            self.state.registry.clone(),
        ));
        if self.state.config.enable_notifier {
            let consumer = consumer.clone();
            tokio::spawn(async move {
                if let Err(e) = consumer.run().await {
                    tracing::error!("Notification consumer exited: {}", e);
                }
            });
            tracing::info!("Notification consumer started");
        }

        // Generation workers
        let generator = Arc::new(Generator::new(
            self.state.store.clone(),
            self.state.pantry.clone(),
            self.state.backend.clone(),
        ));

        for i in 0..self.state.config.concurrency {
            let worker = Worker::new(
                format!("{}-worker-{}", self.state.config.server_name, i),
                self.state.clone(),
                self.shutdown.clone(),
                generator.clone(),
                self.metrics.clone(),
            );
            let count = self.worker_count.clone();
            count.fetch_add(1, Ordering::Relaxed);

            join_set.spawn(async move {
                let result = worker.run().await;
                count.fetch_sub(1, Ordering::Relaxed);
                result
            });
        }

        tracing::info!("Started {} workers", self.state.config.concurrency);

        // Wait for shutdown signal
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                self.shutdown.store(true, Ordering::SeqCst);
            }
        }

        scheduler.shutdown();
        consumer.shutdown();
        self.graceful_shutdown(&mut join_set).await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Graceful shutdown: wait for workers to finish their current jobs, up
    /// to a timeout.
    async fn graceful_shutdown(&self, join_set: &mut JoinSet<Result<()>>) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        let timeout = Duration::from_secs(30);
        let start = std::time::Instant::now();
        let initial_count = self.worker_count.load(Ordering::Relaxed);

        while initial_count > 0 && start.elapsed() < timeout {
            if let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!("Worker error during shutdown: {}", e);
                }
            } else {
                break;
            }
        }

        let remaining = self.worker_count.load(Ordering::Relaxed);
        if remaining > 0 {
            tracing::warn!("Force shutting down {} workers", remaining);
        }

        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
            }
        }

        Ok(())
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            server_name: self.state.config.server_name.clone(),
            active_workers: self.worker_count.load(Ordering::Relaxed),
            live_connections: self.state.registry.len(),
        }
    }
}

impl From<ServerState> for Server {
    fn from(state: ServerState) -> Self {
        Self::new(state)
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    /// Server name
    pub server_name: String,

    /// Number of active workers
    pub active_workers: usize,

    /// Number of live user connections
    pub live_connections: usize,
}
