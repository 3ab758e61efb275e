//! # mealq
//!
//! mealq is a distributed proactive meal-recommendation scheduler based on
//! Rust and Redis.
//!
//! ## Features
//!
//! - Per-user recurring triggers anchored to four daily meal windows, with
//!   fixed per-user jitter to spread the load
//! - Scheduler tick: due-trigger dispatch, bounded-backoff retry drain, and
//!   deferred deletion of superseded results
//! - Generation worker pool calling an external text-generation service
//! - Live ready-notifications over a per-user connection registry
//! - Prometheus monitoring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mealq::client::Client;
//! use mealq::generate::{PantryItem, PantryProvider};
//! use mealq::server::{Server, ServerBuilder};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct InventoryService;
//!
//! #[async_trait]
//! impl PantryProvider for InventoryService {
//!     async fn pantry_snapshot(&self, _user_id: i64) -> mealq::Result<Vec<PantryItem>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Registration side: anchor a trigger and dispatch the first job.
//!     let client = Client::builder()
//!         .redis_url("redis://localhost:6379")
//!         .build()
//!         .await?;
//!     client.register_user(42).await?;
//!
//!     // Server side: scheduler tick + generation workers + notifier.
//!     let state = ServerBuilder::new()
//!         .redis_url("redis://localhost:6379")
//!         .concurrency(4)
//!         .pantry_provider(Arc::new(InventoryService))
//!         .build()
//!         .await?;
//!     Server::from(state).run().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Public module exports
pub mod config;
pub mod error;
pub mod trigger;
pub mod windows;

// Client SDK
pub mod client;

// Server: scheduler tick + worker pool
pub mod server;

// Generation jobs
pub mod generate;

// Live notifications
pub mod notify;

// Storage layer
pub mod storage;

// Observability
pub mod observability;

// Re-export common types
pub use error::{Error, Result};
pub use trigger::{GenerationJob, MealResult, MealTrigger};
pub use windows::{MealTimes, MealWindow};
