//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the recipe advisor.

mod food_nutrients;

pub use food_nutrients::{FoodNutrientsArgs, FoodNutrientsTool};
