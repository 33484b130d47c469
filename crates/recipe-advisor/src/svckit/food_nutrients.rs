//! Food Nutrients Tool
//!
//! Looks up the nutritional profile of a food item.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{tool::ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use crate::error::AdvisorError;
use crate::fooddata::FoodDataClient;
use crate::model::FoodNutrient;

pub const FOOD_NUTRIENTS: &str = "get_food_nutrients";

#[derive(Debug, Deserialize)]
pub struct FoodNutrientsArgs {
    /// Free-text food description, e.g. "brown rice"
    pub query: String,
}

/// Tool for looking up food nutrients
pub struct FoodNutrientsTool {
    client: Arc<dyn FoodDataClient>,
}

impl FoodNutrientsTool {
    pub fn new(client: Arc<dyn FoodDataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for FoodNutrientsTool {
    type Args = FoodNutrientsArgs;
    type Output = Vec<FoodNutrient>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: FOOD_NUTRIENTS.into(),
            description: "Searches for a food item and returns its nutritional information.".into(),
            parameters: vec![ParameterSchema::required(
                "query",
                "string",
                "Food item to search for (e.g., 'brown rice')",
            )],
        }
    }

    async fn call(&self, args: FoodNutrientsArgs) -> CoreResult<Vec<FoodNutrient>> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(AdvisorError::EmptyQuery.into());
        }

        let nutrients = self.client.search_nutrients(query).await?;
        tracing::debug!(
            query,
            source = self.client.name(),
            nutrients = nutrients.len(),
            "Nutrient lookup completed"
        );
        Ok(nutrients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fooddata::MockFoodDataClient;
    use agent_core::{ToolCallRequest, ToolRegistry, tool::TOOL_ERROR_PREFIX};
    use serde_json::json;

    fn registry(client: MockFoodDataClient) -> ToolRegistry {
        let mut registry = ToolRegistry::with_final_answer();
        registry.register(FoodNutrientsTool::new(Arc::new(client)));
        registry
    }

    #[tokio::test]
    async fn test_lookup_returns_nutrient_list() {
        let registry = registry(MockFoodDataClient::new());
        let call = ToolCallRequest::new("call_1", FOOD_NUTRIENTS, json!({"query": "chicken"}));

        let result = registry.execute(&call).await;
        assert!(result.success);
        assert_eq!(result.id, "call_1");

        let data = result.data.unwrap();
        assert_eq!(data[0]["nutrientName"], "Protein");
        assert_eq!(data[0]["unitName"], "G");
        assert!(result.output.contains("\"nutrientName\":\"Protein\""));
    }

    #[tokio::test]
    async fn test_no_match_is_empty_list() {
        let registry = registry(MockFoodDataClient::new());
        let call = ToolCallRequest::new("c", FOOD_NUTRIENTS, json!({"query": "unobtainium"}));

        let result = registry.execute(&call).await;
        assert!(result.success);
        assert_eq!(result.output, "[]");
    }

    #[tokio::test]
    async fn test_api_failure_becomes_observation() {
        let registry = registry(MockFoodDataClient::failing("429 Too Many Requests"));
        let call = ToolCallRequest::new("c", FOOD_NUTRIENTS, json!({"query": "rice"}));

        let result = registry.execute(&call).await;
        assert!(!result.success);
        assert!(result.output.starts_with(TOOL_ERROR_PREFIX));
        assert!(result.output.contains("429 Too Many Requests"));
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let registry = registry(MockFoodDataClient::new());
        let call = ToolCallRequest::new("c", FOOD_NUTRIENTS, json!({"food": "rice"}));

        let result = registry.execute(&call).await;
        assert!(!result.success);
        assert!(result.output.starts_with(TOOL_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let tool = FoodNutrientsTool::new(Arc::new(MockFoodDataClient::new()));
        let err = tool
            .call(FoodNutrientsArgs { query: "  ".into() })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Query must not be empty"));
    }
}
