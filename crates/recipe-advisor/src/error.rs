//! Error Types for Recipe Advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("FoodData Central error: {0}")]
    Api(String),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AdvisorError> for agent_core::AgentError {
    fn from(err: AdvisorError) -> Self {
        Self::ToolExecution(err.to_string())
    }
}
