//! Common test utilities
//!
//! Shared fixtures and mock collaborators for integration tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mealq::generate::{
    GenerationBackend, Ingredient, PantryItem, PantryProvider, Recipe, RecipeSuggestions,
};
use mealq::storage::{Keys, TriggerStore};
use mealq::Result;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Redis URL for integration tests.
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Process-unique user ids, spread out so reruns rarely collide.
pub fn unique_user_id() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(0);
    let base = Utc::now().timestamp_millis() % 1_000_000_000;
    base * 1_000 + NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Serializes lifecycle tests: they share the global job/due/expiry keys.
pub fn lifecycle_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Wipe the shared scheduling keys so a test starts from a clean slate.
pub async fn wipe_shared_keys(store: &TriggerStore) {
    let _ = store
        .redis()
        .del(vec![
            Keys::jobs().into(),
            Keys::retry().into(),
            Keys::due().into(),
            Keys::expiry().into(),
        ])
        .await;
}

/// A fixed, schema-valid suggestion payload.
pub fn sample_suggestions() -> RecipeSuggestions {
    let recipe = |description: &str| Recipe {
        description: description.to_string(),
        ingredients: vec![Ingredient {
            pantry_item_id: Some(1),
            ingredient_name: "Eggs".to_string(),
            quantity: 2.0,
            unit: "pieces".to_string(),
        }],
        steps: vec!["Crack.".to_string(), "Cook.".to_string()],
        time_required: "10 minutes".to_string(),
    };

    RecipeSuggestions {
        recipes: vec![recipe("Omelette"), recipe("Scramble"), recipe("Frittata")],
    }
}

/// Backend that always returns the sample suggestions and counts calls.
#[derive(Clone, Default)]
pub struct StaticBackend {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GenerationBackend for StaticBackend {
    async fn generate(&self, _prompt: &str) -> Result<RecipeSuggestions> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(sample_suggestions())
    }
}

/// Backend that always fails with a retryable generation error.
#[derive(Clone, Default)]
pub struct FailingBackend {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GenerationBackend for FailingBackend {
    async fn generate(&self, _prompt: &str) -> Result<RecipeSuggestions> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(mealq::Error::Generation("service unavailable".to_string()))
    }
}

/// Pantry collaborator with a small fixed inventory.
pub struct StaticPantry;

#[async_trait]
impl PantryProvider for StaticPantry {
    async fn pantry_snapshot(&self, _user_id: i64) -> Result<Vec<PantryItem>> {
        let now = Utc::now();
        Ok(vec![
            PantryItem {
                id: 1,
                name: "Eggs".to_string(),
                brand: None,
                quantity: 12.0,
                unit: Some("pieces".to_string()),
                purchase_date: now - Duration::days(1),
                shelf_life_days: 21,
                user_flagged: false,
            },
            PantryItem {
                id: 2,
                name: "Spinach".to_string(),
                brand: Some("Local Farm".to_string()),
                quantity: 200.0,
                unit: Some("grams".to_string()),
                purchase_date: now - Duration::days(4),
                shelf_life_days: 5,
                user_flagged: false,
            },
        ])
    }
}
