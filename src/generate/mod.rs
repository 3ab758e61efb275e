//! Generation job execution
//!
//! Turns one `(user, window)` job into a stored result: gathers the pantry
//! snapshot, prompts the generation collaborator, validates the suggestions,
//! persists the result, flips the trigger's current pointer, and publishes
//! the ready event.

pub mod llm;
pub mod prompt;

pub use llm::{GenerationBackend, HttpGenerationClient, Ingredient, PantryItemInput, Recipe, RecipeSuggestions};
pub use prompt::{build_prompt, prioritize, PrioritizedItems};

use crate::storage::TriggerStore;
use crate::trigger::{GenerationJob, MealResult};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One item of a user's pantry inventory, as supplied by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItem {
    /// Pantry item id
    pub id: i64,
    /// Ingredient name
    pub name: String,
    /// Brand, when known
    pub brand: Option<String>,
    /// Quantity on hand
    pub quantity: f64,
    /// Unit of the stored quantity
    pub unit: Option<String>,
    /// When the item was purchased
    pub purchase_date: DateTime<Utc>,
    /// Average shelf life in days
    pub shelf_life_days: i64,
    /// Whether the user asked to prioritize this item
    pub user_flagged: bool,
}

/// External collaborator supplying a user's current pantry contents.
#[async_trait]
pub trait PantryProvider: Send + Sync {
    /// Fetch the user's pantry inventory.
    async fn pantry_snapshot(&self, user_id: i64) -> Result<Vec<PantryItem>>;
}

/// Executes generation jobs against injected collaborators.
///
/// Holds its own store and transport handles; constructed explicitly by the
/// server (or a test) rather than living in any global.
pub struct Generator {
    store: TriggerStore,
    pantry: Arc<dyn PantryProvider>,
    backend: Arc<dyn GenerationBackend>,
}

impl Generator {
    /// Create a generator from its collaborators.
    pub fn new(
        store: TriggerStore,
        pantry: Arc<dyn PantryProvider>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            store,
            pantry,
            backend,
        }
    }

    /// Run one generation job to completion.
    ///
    /// Safe under at-least-once dispatch: a duplicate run writes a second
    /// result and the trigger's current pointer converges to the later
    /// write. The previous result is never deleted here; its removal belongs
    /// to the scheduler's expiry pass.
    pub async fn run(&self, job: &GenerationJob) -> Result<MealResult> {
        let window = job.window()?;
        tracing::info!("Generating {} meals for user {}", window, job.user_id);

        let items = self.pantry.pantry_snapshot(job.user_id).await?;
        let prioritized = prioritize(&items, Utc::now());
        let prompt = build_prompt(&prioritized, window);

        let suggestions = self.backend.generate(&prompt).await?;

        let payload = serde_json::to_string(&suggestions)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let result = MealResult::new(job.user_id, window, payload);

        self.store.store_result(&result).await?;
        self.store.set_current_result(job.user_id, &result.id).await?;
        self.store.publish_generated(job.user_id).await?;

        tracing::info!(
            "Stored {} result {} for user {}",
            window,
            result.id,
            job.user_id
        );
        Ok(result)
    }
}
