//! Food Data Integration
//!
//! Abstractions and implementations for nutrient data sources.

mod mock;
mod usda;

pub use mock::MockFoodDataClient;
pub use usda::{UsdaClient, USDA_API_KEY_ENV, USDA_BASE_URL};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::FoodNutrient;

/// Nutrient source trait (Strategy pattern)
///
/// Implemented by the live USDA client and by the in-memory table used for
/// demos and tests.
#[async_trait]
pub trait FoodDataClient: Send + Sync {
    /// Nutrients of the first food matching `query`, empty when none matched
    async fn search_nutrients(&self, query: &str) -> Result<Vec<FoodNutrient>>;

    /// Source name
    fn name(&self) -> &str;
}
