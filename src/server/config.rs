//! Server configuration and builder

use crate::generate::{GenerationBackend, HttpGenerationClient, PantryProvider};
use crate::notify::ConnectionRegistry;
use crate::storage::{RedisClient, RedisConfig, TriggerStore};
use crate::{config, Error, Result};
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Server instance name (worker id prefix)
    pub server_name: String,
    /// Number of concurrent generation workers
    pub concurrency: usize,
    /// BLPOP timeout in seconds for job dequeue
    pub dequeue_timeout: u64,
    /// Heartbeat publication interval in seconds
    pub heartbeat_interval: u64,
    /// Seconds without a heartbeat before a worker counts as dead
    pub worker_timeout: u64,
    /// Whether this instance runs the scheduler tick
    pub enable_scheduler: bool,
    /// Whether this instance runs the notification consumer
    pub enable_notifier: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            server_name: "mealq".to_string(),
            concurrency: 4,
            dequeue_timeout: 5,
            heartbeat_interval: 15,
            worker_timeout: 60,
            enable_scheduler: true,
            enable_notifier: true,
        }
    }
}

/// Shared server state
pub struct ServerState {
    /// Server configuration
    pub config: ServerConfig,
    /// Redis client
    pub redis: RedisClient,
    /// Typed trigger/result store
    pub store: TriggerStore,
    /// Pantry inventory collaborator
    pub pantry: Arc<dyn PantryProvider>,
    /// Text-generation collaborator
    pub backend: Arc<dyn GenerationBackend>,
    /// Live connection registry
    pub registry: Arc<ConnectionRegistry>,
}

/// Server builder
pub struct ServerBuilder {
    config: ServerConfig,
    pantry: Option<Arc<dyn PantryProvider>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    registry: Option<Arc<ConnectionRegistry>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            pantry: None,
            backend: None,
            registry: None,
        }
    }

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

    /// Set the server instance name
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    /// Set the number of generation workers
    #[must_use]
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.config.concurrency = workers;
        self
    }

    /// Set the job dequeue timeout in seconds
    #[must_use]
    pub fn dequeue_timeout(mut self, secs: u64) -> Self {
        self.config.dequeue_timeout = secs;
        self
    }

    /// Disable the scheduler tick on this instance
    #[must_use]
    pub fn without_scheduler(mut self) -> Self {
        self.config.enable_scheduler = false;
        self
    }

    /// Disable the notification consumer on this instance
    #[must_use]
    pub fn without_notifier(mut self) -> Self {
        self.config.enable_notifier = false;
        self
    }

    /// Set the pantry inventory collaborator (required)
    #[must_use]
    pub fn pantry_provider(mut self, pantry: Arc<dyn PantryProvider>) -> Self {
        self.pantry = Some(pantry);
        self
    }

    /// Set the text-generation collaborator.
    ///
    /// Defaults to [`HttpGenerationClient::from_env`].
    #[must_use]
    pub fn generation_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share an externally owned connection registry.
    ///
    /// The transport layer serving live sockets registers connections on the
    /// same registry instance the notifier pushes through.
    #[must_use]
    pub fn connection_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the server state
    pub async fn build(self) -> Result<ServerState> {
        config::get_config()
            .validate()
            .map_err(Error::Config)?;

        let pantry = self
            .pantry
            .ok_or_else(|| Error::Config("pantry provider is required".into()))?;
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(HttpGenerationClient::from_env()));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ConnectionRegistry::new()));

        if self.config.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }

        let redis = RedisClient::new(RedisConfig {
            url: self.config.redis_url.clone(),
            pool_size: self.config.pool_size,
        })
        .await?;
        let store = TriggerStore::new(redis.clone());

        Ok(ServerState {
            config: self.config,
            redis,
            store,
            pantry,
            backend,
            registry,
        })
    }
}
