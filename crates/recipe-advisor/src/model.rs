//! Domain Models
//!
//! Wire types for the USDA FoodData Central search API.

use serde::{Deserialize, Serialize};

/// Response of `GET /fdc/v1/foods/search`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSearchResponse {
    #[serde(default)]
    pub total_hits: u64,

    #[serde(default)]
    pub foods: Vec<Food>,
}

impl FoodSearchResponse {
    /// Nutrients of the best match, empty when nothing matched
    pub fn into_first_nutrients(self) -> Vec<FoodNutrient> {
        self.foods
            .into_iter()
            .next()
            .map(|food| food.food_nutrients)
            .unwrap_or_default()
    }
}

/// A single search hit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    /// FoodData Central identifier
    #[serde(default)]
    pub fdc_id: u64,

    #[serde(default)]
    pub description: String,

    /// e.g. "Foundation", "Branded", "SR Legacy"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

/// One nutrient value per 100 g of the food
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodNutrient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrient_id: Option<u32>,

    pub nutrient_name: String,

    /// Unit as reported by the API (G, MG, KCAL, ...)
    #[serde(default)]
    pub unit_name: String,

    #[serde(default)]
    pub value: f64,
}

impl FoodNutrient {
    pub fn new(nutrient_id: u32, name: &str, unit: &str, value: f64) -> Self {
        Self {
            nutrient_id: Some(nutrient_id),
            nutrient_name: name.to_string(),
            unit_name: unit.to_string(),
            value,
        }
    }
}
