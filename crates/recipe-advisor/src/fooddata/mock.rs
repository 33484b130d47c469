//! Mock Food Data Client
//!
//! For demos and tests. Returns a small static nutrient table per 100 g.

use async_trait::async_trait;

use super::FoodDataClient;
use crate::error::{AdvisorError, Result};
use crate::model::FoodNutrient;

// (keywords, protein g, fat g, carbohydrate g, energy kcal, fiber g)
const FOODS: &[(&[&str], f64, f64, f64, f64, f64)] = &[
    (&["brown rice"], 2.74, 0.97, 23.5, 123.0, 1.6),
    (&["white rice", "rice"], 2.69, 0.28, 28.2, 130.0, 0.4),
    (&["chicken breast", "chicken"], 22.5, 1.93, 0.0, 120.0, 0.0),
    (&["salmon"], 20.4, 13.4, 0.0, 208.0, 0.0),
    (&["broccoli"], 2.82, 0.37, 6.64, 34.0, 2.6),
    (&["olive oil"], 0.0, 100.0, 0.0, 884.0, 0.0),
    (&["butter"], 0.85, 81.1, 0.06, 717.0, 0.0),
    (&["whole wheat pasta"], 5.33, 0.93, 26.5, 124.0, 4.5),
    (&["pasta"], 5.8, 0.93, 30.9, 158.0, 1.8),
    (&["greek yogurt"], 10.3, 0.37, 3.64, 61.0, 0.0),
    (&["sour cream"], 2.44, 19.4, 4.63, 198.0, 0.0),
    (&["oats", "oatmeal"], 13.2, 6.52, 67.7, 379.0, 10.1),
    (&["sugar"], 0.0, 0.32, 99.6, 385.0, 0.0),
];

/// Mock food data client with a static nutrient table
#[derive(Default)]
pub struct MockFoodDataClient {
    fail_with: Option<String>,
}

impl MockFoodDataClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup fails with an API error (for exercising error paths)
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
        }
    }

    fn lookup(query: &str) -> Vec<FoodNutrient> {
        let query = query.to_lowercase();
        FOODS
            .iter()
            .find(|(keywords, ..)| keywords.iter().any(|k| query.contains(k)))
            .map(|&(_, protein, fat, carbs, energy, fiber)| {
                vec![
                    FoodNutrient::new(1003, "Protein", "G", protein),
                    FoodNutrient::new(1004, "Total lipid (fat)", "G", fat),
                    FoodNutrient::new(1005, "Carbohydrate, by difference", "G", carbs),
                    FoodNutrient::new(1008, "Energy", "KCAL", energy),
                    FoodNutrient::new(1079, "Fiber, total dietary", "G", fiber),
                ]
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl FoodDataClient for MockFoodDataClient {
    async fn search_nutrients(&self, query: &str) -> Result<Vec<FoodNutrient>> {
        if let Some(message) = &self.fail_with {
            return Err(AdvisorError::Api(message.clone()));
        }
        Ok(Self::lookup(query))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_more_specific_keyword_wins() {
        let client = MockFoodDataClient::new();
        let brown = client.search_nutrients("Brown Rice").await.unwrap();
        let white = client.search_nutrients("rice").await.unwrap();
        assert!((brown[4].value - 1.6).abs() < f64::EPSILON);
        assert!((white[4].value - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unknown_food_is_empty() {
        let client = MockFoodDataClient::new();
        assert!(client.search_nutrients("dragonfruit").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = MockFoodDataClient::failing("503 Service Unavailable");
        let err = client.search_nutrients("rice").await.unwrap_err();
        assert_eq!(err.to_string(), "FoodData Central error: 503 Service Unavailable");
    }
}
