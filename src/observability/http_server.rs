//! HTTP metrics server
//!
//! Provides an HTTP endpoint for Prometheus metrics scraping.

#[cfg(feature = "metrics-http")]
use super::MealqMetrics;
#[cfg(feature = "metrics-http")]
use std::net::SocketAddr;
#[cfg(feature = "metrics-http")]
use std::sync::Arc;
#[cfg(feature = "metrics-http")]
use warp::Filter;

/// HTTP metrics server
///
/// Serves Prometheus metrics on the `/metrics` endpoint.
#[cfg(feature = "metrics-http")]
pub struct MetricsServer {
    metrics: Arc<MealqMetrics>,
    bind_address: SocketAddr,
}

#[cfg(feature = "metrics-http")]
impl MetricsServer {
    /// Create a new metrics server
    pub fn new(metrics: Arc<MealqMetrics>, bind_address: SocketAddr) -> Self {
        Self {
            metrics,
            bind_address,
        }
    }

    /// Create a new metrics server binding to 0.0.0.0:9090
    pub fn new_default(metrics: Arc<MealqMetrics>) -> Self {
        Self::new(metrics, SocketAddr::from(([0, 0, 0, 0], 9090)))
    }

    /// Get the metrics as a string
    pub fn get_metrics(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.metrics.registry().gather();
        match encoder.encode_to_string(&metric_families) {
            Ok(s) => s,
            Err(_) => String::from("# Error encoding metrics\n"),
        }
    }

    /// Start the HTTP server
    pub async fn run(self) -> Result<(), crate::Error> {
        let metrics = self.metrics.clone();

        let route = warp::path!("metrics").and(warp::get()).map(move || {
            let encoder = prometheus::TextEncoder::new();
            let metric_families = metrics.registry().gather();
            let body = encoder
                .encode_to_string(&metric_families)
                .unwrap_or_else(|_| String::from("# Error encoding metrics\n"));
            warp::reply::with_header(body, "Content-Type", "text/plain; version=0.0.4")
        });

        warp::serve(route).run(self.bind_address).await;
        Ok(())
    }
}
