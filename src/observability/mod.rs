//! Observability
//!
//! Prometheus metrics collection, with an optional HTTP scrape endpoint
//! behind the `metrics-http` feature.

pub mod http_server;
pub mod metrics;

pub use metrics::MealqMetrics;

#[cfg(feature = "metrics-http")]
pub use http_server::MetricsServer;
