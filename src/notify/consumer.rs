//! Event consumer
//!
//! A single task subscribed to the meal event channels. Each received event
//! names a user; the consumer resolves the user's live connection through
//! the registry and pushes a content-free signal. Delivery of the channel is
//! at-least-once; duplicate events just push the same signal again, which
//! clients treat as another re-fetch hint.

use crate::notify::{ConnectionRegistry, PushEvent, PushOutcome, UserEvent};
use crate::storage::{Keys, RedisClient};
use crate::Result;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Consumes meal events and relays them to live connections.
pub struct NotifyConsumer {
    redis: RedisClient,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<AtomicBool>,
}

impl NotifyConsumer {
    /// Create a consumer over a Redis client and the shared registry.
    pub fn new(redis: RedisClient, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            redis,
            registry,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to the shutdown flag.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Request the consumer loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Run the consumer loop until shutdown.
    pub async fn run(&self) -> Result<()> {
        let subscriber = self.redis.subscriber().await?;
        subscriber
            .subscribe(vec![
                Keys::generated_channel().to_string(),
                Keys::invalidated_channel().to_string(),
            ])
            .await?;

        let mut rx = subscriber.message_rx();
        tracing::info!(
            "Notification consumer subscribed to {} and {}",
            Keys::generated_channel(),
            Keys::invalidated_channel()
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::select! {
                message = rx.recv() => match message {
                    Ok(message) => self.handle(&message.channel, &message.value),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        // Clients re-fetch on the next signal; a lost signal is
                        // recoverable, so just note it.
                        tracing::warn!("Notification consumer lagged, {} events dropped", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Notification subscription stream closed");
                        break;
                    }
                },
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }

        let _ = subscriber.quit().await;
        tracing::info!("Notification consumer stopped");
        Ok(())
    }

    fn handle(&self, channel: &str, value: &fred::types::RedisValue) {
        let Some(payload) = value.as_string() else {
            tracing::warn!("Non-string event payload on channel {}", channel);
            return;
        };

        let event: UserEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Malformed event on channel {}: {}", channel, e);
                return;
            }
        };

        let push = if channel == Keys::invalidated_channel() {
            PushEvent::MealInvalidated
        } else {
            PushEvent::MealReady
        };

        match self.registry.push(event.user_id, push) {
            PushOutcome::Delivered => {
                tracing::debug!("Pushed {:?} to user {}", push, event.user_id);
            }
            PushOutcome::NotConnected => {
                tracing::debug!("User {} has no live connection", event.user_id);
            }
        }
    }
}
