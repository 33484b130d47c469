//! # recipe-advisor
//!
//! Recipe improvement advisor: domain tools and prompts for an agent that
//! proposes healthier variations of the user's recipes.
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  get_food_nutrients  ──▶  FoodDataClient                     │
//! │                           ├── UsdaClient (FoodData Central)  │
//! │                           └── MockFoodDataClient (static)    │
//! │  final_answer        ──▶  ends the turn (agent-core)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fooddata;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{AdvisorError, Result};
pub use fooddata::{FoodDataClient, MockFoodDataClient, UsdaClient};
pub use model::{Food, FoodNutrient, FoodSearchResponse};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{FoodNutrientsArgs, FoodNutrientsTool};
}

/// Registry with the terminal tool and the nutrient lookup backed by `client`
pub fn default_registry(client: Arc<dyn FoodDataClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::with_final_answer();
    registry.register(tools::FoodNutrientsTool::new(client));
    registry
}

/// System prompt for the recipe advisor agent
pub const RECIPE_ADVISOR_PROMPT: &str = r"You are a helpful AI assistant that helps users to make their recipes healthier by always proposing 3 different minor modifications that make it healthier.
Remember the user's personal details (age, sex, height, weight, health targets, exercise level) that you may receive in the user's first message for future interactions.
At the very beginning you should ask the user to share a recipe they want to make healthier, and from time to time you can ask them if they have another one to work on.
Use `get_food_nutrients` to ground your suggestions in real nutritional data, and always reply through the `final_answer` tool.
Please do not use the same tool more than 5 times in a row. That's really important.";

/// Greeting that opens every conversation
pub const INITIAL_GREETING: &str = "📝 This chat is designed to help you improve your recipes and make them healthier!

🙋 To personalize your experience, you can share a few optional details:
Age, sex, height, weight, your health or fitness goals, and your activity level.

🔒 This information won't be stored in any database and is only used temporarily
to better understand your needs and optimize the model's responses.

🌱 Let's become healthier, one step at a time!";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_tools() {
        let registry = default_registry(Arc::new(MockFoodDataClient::new()));
        assert_eq!(registry.names(), vec!["final_answer", "get_food_nutrients"]);
    }

    #[test]
    fn test_prompt_mentions_tools() {
        assert!(RECIPE_ADVISOR_PROMPT.contains("get_food_nutrients"));
        assert!(RECIPE_ADVISOR_PROMPT.contains("final_answer"));
    }
}
