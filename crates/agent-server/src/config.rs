//! Server Configuration
//!
//! Read once from the environment (after `.env` is loaded).

use axum::http::HeaderValue;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_ITERATIONS: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Origin allowed by CORS (the chat frontend)
    pub allowed_origin: HeaderValue,

    /// Model requested from the back-end
    pub model: String,

    /// Model invocations allowed per turn
    pub max_iterations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            allowed_origin: HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN),
            model: DEFAULT_MODEL.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let allowed_origin = match var("ALLOWED_ORIGIN") {
            Some(value) => HeaderValue::from_str(&value).map_err(|_| ConfigError::Invalid {
                name: "ALLOWED_ORIGIN",
                value,
            })?,
            None => defaults.allowed_origin,
        };

        let max_iterations = match var("AGENT_MAX_ITERATIONS") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AGENT_MAX_ITERATIONS",
                        value,
                    });
                }
            },
            None => defaults.max_iterations,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            allowed_origin,
            model: var("OPENAI_MODEL").unwrap_or(defaults.model),
            max_iterations,
        })
    }
}
