//! USDA FoodData Central Client

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::FoodDataClient;
use crate::error::{AdvisorError, Result};
use crate::model::{FoodNutrient, FoodSearchResponse};

pub const USDA_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";
pub const USDA_API_KEY_ENV: &str = "USDA_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Live client for the FoodData Central search endpoint
pub struct UsdaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UsdaClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(USDA_BASE_URL, api_key)
    }

    /// Point the client at another deployment (or a local stub server)
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Read the API key from `USDA_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(USDA_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AdvisorError::Config(format!("{USDA_API_KEY_ENV} is not set")))?;
        Self::new(api_key)
    }

    fn search_url(&self) -> String {
        format!("{}/foods/search", self.base_url)
    }
}

#[async_trait]
impl FoodDataClient for UsdaClient {
    async fn search_nutrients(&self, query: &str) -> Result<Vec<FoodNutrient>> {
        debug!(query, "Searching FoodData Central");

        let response = self
            .client
            .get(self.search_url())
            .query(&[("api_key", self.api_key.as_str()), ("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Api(format!("{status}: {body}")));
        }

        let body = response.text().await?;
        let search: FoodSearchResponse = serde_json::from_str(&body)?;
        debug!(query, hits = search.foods.len(), "FoodData Central search completed");

        Ok(search.into_first_nutrients())
    }

    fn name(&self) -> &str {
        "usda"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_trims_trailing_slash() {
        let client = UsdaClient::with_base_url("http://localhost:9000/fdc/v1/", "key").unwrap();
        assert_eq!(client.search_url(), "http://localhost:9000/fdc/v1/foods/search");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = UsdaClient::with_base_url("http://127.0.0.1:9", "key").unwrap();
        let err = client.search_nutrients("rice").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Network(_)));
    }
}
