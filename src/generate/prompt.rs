//! Prompt construction for meal generation
//!
//! Splits the pantry snapshot into priority tiers and renders the
//! meal-suggestion prompt with the fixed output contract.

use crate::generate::llm::PantryItemInput;
use crate::generate::PantryItem;
use crate::windows::MealWindow;
use chrono::{DateTime, Utc};

/// Ingredients close enough to expiry to promote into the priority tier.
const EXPIRY_HORIZON_DAYS: i64 = 2;

/// Pantry snapshot split into priority tiers for the prompt.
#[derive(Debug, Clone, Default)]
pub struct PrioritizedItems {
    /// Close to expiry, or flagged by the user
    pub high_priority: Vec<PantryItemInput>,
    /// Everything else
    pub normal_priority: Vec<PantryItemInput>,
}

/// Split pantry items into priority tiers.
///
/// An item is high priority when its remaining shelf life is under the
/// expiry horizon, or when the user flagged it. A flagged item appears only
/// in the priority tier.
pub fn prioritize(items: &[PantryItem], now: DateTime<Utc>) -> PrioritizedItems {
    let mut prioritized = PrioritizedItems::default();

    for item in items {
        let days_owned = (now - item.purchase_date).num_days();
        let input = PantryItemInput {
            pantry_item_id: item.id,
            ingredient_name: item.name.clone(),
            ingredient_brand: item.brand.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            days_owned,
        };

        if item.user_flagged || item.shelf_life_days - days_owned < EXPIRY_HORIZON_DAYS {
            prioritized.high_priority.push(input);
        } else {
            prioritized.normal_priority.push(input);
        }
    }

    tracing::debug!(
        "Pantry split for prompt: {} high priority, {} normal",
        prioritized.high_priority.len(),
        prioritized.normal_priority.len()
    );

    prioritized
}

/// Render the meal-suggestion prompt for one window.
pub fn build_prompt(items: &PrioritizedItems, window: MealWindow) -> String {
    let high = serde_json::to_string_pretty(&items.high_priority).unwrap_or_else(|_| "[]".into());
    let normal =
        serde_json::to_string_pretty(&items.normal_priority).unwrap_or_else(|_| "[]".into());

    format!(
        r#"<task>
You are a meal-planning assistant. Your goals are:
1. Reduce food waste by prioritizing expiring items.
2. Suggest meals that taste normal and are easy to cook.
3. Respect realistic ingredient pairings and quantities.
</task>

<rules>
- You will receive two ingredient lists:
    - high_priority_ingredients (close to expiry OR user-selected)
    - normal_priority_ingredients (everything else)
- An ingredient appearing in BOTH lists is high priority.
- You must suggest EXACTLY 3 meal ideas.
- A meal may be a normal cooked recipe, a ready-to-eat item, or a main dish plus a simple side.
- Do NOT force ingredients together if they don't fit. Taste beats using everything.
- Pantry staples like oil, salt, pepper, garlic powder can be assumed available.
- When referencing pantry ingredients you MUST include the exact pantryItemId.
- Staples MUST be listed as ingredients with pantryItemId -1.
- Units of measurement MUST be common kitchen-friendly units (cups, tablespoons,
  teaspoons, pieces, slices, grams, ounces); convert stored quantities when needed.
</rules>

<output_requirements>
Your answer MUST be a single valid JSON object of the form:
{{"recipes": [{{"description": string, "ingredients": [{{"pantryItemId": number, "ingredientName": string, "quantity": number, "unit": string}}], "steps": [string], "timeRequired": string}}]}}
with exactly 3 entries in "recipes". Return ONLY the JSON object.
</output_requirements>

<high_priority_ingredients>
{high}
</high_priority_ingredients>

<normal_priority_ingredients>
{normal}
</normal_priority_ingredients>

<meal_time>
{window}
</meal_time>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: i64, shelf_life: i64, owned_days: i64, flagged: bool, now: DateTime<Utc>) -> PantryItem {
        PantryItem {
            id,
            name: format!("item-{id}"),
            brand: None,
            quantity: 1.0,
            unit: Some("pieces".to_string()),
            purchase_date: now - Duration::days(owned_days),
            shelf_life_days: shelf_life,
            user_flagged: flagged,
        }
    }

    #[test]
    fn test_prioritize_by_shelf_life() {
        let now = Utc::now();
        let items = vec![
            item(1, 5, 4, false, now), // 1 day left -> high
            item(2, 10, 2, false, now), // 8 days left -> normal
            item(3, 5, 3, false, now), // 2 days left -> normal (at the horizon)
        ];

        let prioritized = prioritize(&items, now);
        assert_eq!(prioritized.high_priority.len(), 1);
        assert_eq!(prioritized.high_priority[0].pantry_item_id, 1);
        assert_eq!(prioritized.normal_priority.len(), 2);
    }

    #[test]
    fn test_prioritize_user_flagged() {
        let now = Utc::now();
        let items = vec![item(1, 30, 0, true, now)];

        let prioritized = prioritize(&items, now);
        assert_eq!(prioritized.high_priority.len(), 1);
        assert!(prioritized.normal_priority.is_empty());
    }

    #[test]
    fn test_prompt_mentions_window_and_items() {
        let now = Utc::now();
        let prioritized = prioritize(&[item(7, 3, 2, false, now)], now);

        let prompt = build_prompt(&prioritized, MealWindow::EveningSnack);
        assert!(prompt.contains("eveningSnack"));
        assert!(prompt.contains("item-7"));
        assert!(prompt.contains("EXACTLY 3"));
    }
}
