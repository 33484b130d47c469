//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for streaming chat back-ends with tool calling,
//! allowing the agent to work with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = OpenAiProvider::from_env()?;
//! let mut stream = provider
//!     .complete_stream(&messages, &registry.schemas(), &GenerationOptions::default())
//!     .await?;
//! while let Some(chunk) = stream.next().await { /* ... */ }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolSchema;

/// Whether and how the model may call tools
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides
    #[default]
    Auto,
    /// At least one tool call is mandatory
    Required,
    /// Tools are disabled
    None,
}

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o-mini", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Tool calling policy
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            max_tokens: None,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    #[serde(other)]
    Other,
}

/// Fragment of a tool call still being streamed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the model turn
    #[serde(default)]
    pub index: u32,

    /// Call id, present only on the fragment that opens a call
    #[serde(default)]
    pub id: Option<String>,

    /// Function name, present only on the fragment that opens a call
    #[serde(default)]
    pub name: Option<String>,

    /// Next slice of the JSON argument text
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    /// Fragment opening a new call
    pub fn open(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }
    }

    /// Fragment continuing the current call's arguments
    pub fn args(index: u32, arguments: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments: Some(arguments.into()),
        }
    }
}

/// A raw delta from a streaming completion
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta
    #[serde(default)]
    pub content: Option<String>,

    /// Tool call fragments carried by this delta
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,

    /// Set on the last delta of a completion
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,

    /// Token usage (typically only on final chunk)
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            tool_calls: vec![delta],
            ..Default::default()
        }
    }
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Stream a completion over `messages`, offering `tools` to the model
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!(opts.temperature.abs() < f32::EPSILON);
        assert_eq!(opts.model, "gpt-4o-mini");
        assert_eq!(opts.tool_choice, ToolChoice::Auto);
    }

    #[test]
    fn test_finish_reason_unknown_values() {
        let reason: FinishReason = serde_json::from_str("\"function_call\"").unwrap();
        assert_eq!(reason, FinishReason::Other);
        let reason: FinishReason = serde_json::from_str("\"tool_calls\"").unwrap();
        assert_eq!(reason, FinishReason::ToolCalls);
    }
}
