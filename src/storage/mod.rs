//! Storage layer
//!
//! Provides Redis storage abstraction and the typed trigger/result store.

pub mod keys;
pub mod redis;
pub mod store;

pub use keys::Keys;
pub use redis::{RedisClient, RedisConfig};
pub use store::{StoreStats, TriggerStore};
