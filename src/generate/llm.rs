//! Generation collaborator client
//!
//! Wire types for the meal-suggestion request/response contract and an
//! OpenAI-compatible HTTP backend. The response schema is fixed: exactly
//! three suggested meals, each with a description, ingredient list, step
//! list, and time estimate. Anything that fails transport or schema
//! validation surfaces as a retryable generation error.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of meal suggestions the collaborator must return.
pub const EXPECTED_RECIPES: usize = 3;

/// One pantry ingredient as presented to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItemInput {
    /// Pantry item id, echoed back by the service
    #[serde(rename = "pantryItemId")]
    pub pantry_item_id: i64,
    /// Ingredient name
    #[serde(rename = "ingredientName")]
    pub ingredient_name: String,
    /// Brand, when known
    #[serde(rename = "ingredientBrand")]
    pub ingredient_brand: Option<String>,
    /// Quantity on hand
    pub quantity: f64,
    /// Unit of the stored quantity
    pub unit: Option<String>,
    /// Days since purchase
    #[serde(rename = "daysOwned")]
    pub days_owned: i64,
}

/// One ingredient reference inside a suggested meal.
///
/// Pantry ingredients carry the echoed pantry item id; assumed staples
/// (oil, salt, spices) carry id -1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    /// Echoed pantry item id, or -1 for staples
    #[serde(rename = "pantryItemId")]
    pub pantry_item_id: Option<i64>,
    /// Exact ingredient name
    #[serde(rename = "ingredientName")]
    pub ingredient_name: String,
    /// Quantity used
    pub quantity: f64,
    /// Kitchen-friendly unit
    pub unit: String,
}

/// One suggested meal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// One-sentence description of the meal
    pub description: String,
    /// Ingredients used, pantry items and staples alike
    pub ingredients: Vec<Ingredient>,
    /// Preparation steps
    pub steps: Vec<String>,
    /// Approximate preparation time, e.g. "25 minutes"
    #[serde(rename = "timeRequired")]
    pub time_required: String,
}

/// The full response payload: the fixed suggestion schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSuggestions {
    /// Suggested meals, exactly [`EXPECTED_RECIPES`] entries
    pub recipes: Vec<Recipe>,
}

impl RecipeSuggestions {
    /// Parse and schema-check a raw response body.
    pub fn parse(raw: &str) -> Result<Self> {
        let suggestions: RecipeSuggestions = serde_json::from_str(raw)
            .map_err(|e| Error::Generation(format!("response failed schema validation: {e}")))?;
        suggestions.validate()?;
        Ok(suggestions)
    }

    /// Enforce the fixed contract beyond field shapes.
    pub fn validate(&self) -> Result<()> {
        if self.recipes.len() != EXPECTED_RECIPES {
            return Err(Error::Generation(format!(
                "expected exactly {} recipes, got {}",
                EXPECTED_RECIPES,
                self.recipes.len()
            )));
        }
        Ok(())
    }
}

/// The external text-generation collaborator.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one generation request and return the validated suggestions.
    async fn generate(&self, prompt: &str) -> Result<RecipeSuggestions>;
}

/// OpenAI-compatible chat-completions backend in JSON mode.
pub struct HttpGenerationClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGenerationClient {
    /// Create a client for an explicit endpoint and model.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(90),
        }
    }

    /// Create a client from environment variables.
    ///
    /// `MEALQ_LLM_URL` (default `https://api.openai.com/v1`),
    /// `MEALQ_LLM_API_KEY`, `MEALQ_LLM_MODEL` (default `gpt-4o-mini`).
    pub fn from_env() -> Self {
        let base_url = std::env::var("MEALQ_LLM_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("MEALQ_LLM_API_KEY").unwrap_or_default();
        let model =
            std::env::var("MEALQ_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<RecipeSuggestions> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
        });

        let url = format!("{}/chat/completions", self.base_url);
        let req = self.client.post(&url).json(&body).timeout(self.timeout);

        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "generation service returned {status}: {text}"
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed response body: {e}")))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::Generation("response carried no message content".into()))?;

        RecipeSuggestions::parse(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(description: &str) -> Recipe {
        Recipe {
            description: description.to_string(),
            ingredients: vec![Ingredient {
                pantry_item_id: Some(24),
                ingredient_name: "Chicken Breast".to_string(),
                quantity: 2.0,
                unit: "pieces".to_string(),
            }],
            steps: vec!["Cook it.".to_string()],
            time_required: "25 minutes".to_string(),
        }
    }

    #[test]
    fn test_parse_valid_response() {
        let suggestions = RecipeSuggestions {
            recipes: vec![recipe("a"), recipe("b"), recipe("c")],
        };
        let raw = serde_json::to_string(&suggestions).unwrap();

        let parsed = RecipeSuggestions::parse(&raw).unwrap();
        assert_eq!(parsed.recipes.len(), EXPECTED_RECIPES);
        assert_eq!(parsed.recipes[0].ingredients[0].pantry_item_id, Some(24));
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        let suggestions = RecipeSuggestions {
            recipes: vec![recipe("only one")],
        };
        let raw = serde_json::to_string(&suggestions).unwrap();

        let err = RecipeSuggestions::parse(&raw).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = RecipeSuggestions::parse("not json at all").unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_wire_field_names() {
        let item = PantryItemInput {
            pantry_item_id: 24,
            ingredient_name: "Milk".to_string(),
            ingredient_brand: Some("Kroger".to_string()),
            quantity: 1.0,
            unit: Some("gallon".to_string()),
            days_owned: 3,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["pantryItemId"], 24);
        assert_eq!(json["ingredientName"], "Milk");
        assert_eq!(json["daysOwned"], 3);
    }
}
