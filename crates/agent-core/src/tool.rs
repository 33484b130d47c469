//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools declare typed arguments; the registry decodes the model's JSON payload
//! once at its boundary and turns every failure into a textual observation.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::ToolCallRequest;

/// Name of the terminal tool that ends the reasoning loop
pub const FINAL_ANSWER: &str = "final_answer";

/// Prefix of every observation produced by a failed tool call
pub const TOOL_ERROR_PREFIX: &str = "Error fetching data:";

/// Result from tool execution, keyed by the originating call id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID from the request
    pub id: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Observation text fed back to the model
    pub output: String,

    /// Structured output (successful calls only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(call: &ToolCallRequest, data: serde_json::Value) -> Self {
        let output = match &data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            name: call.name.clone(),
            id: call.id.clone(),
            success: true,
            output,
            data: Some(data),
        }
    }

    pub fn failure(call: &ToolCallRequest, error: &AgentError) -> Self {
        Self {
            name: call.name.clone(),
            id: call.id.clone(),
            success: false,
            output: format!("{TOOL_ERROR_PREFIX} {error}"),
            data: None,
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Item schema for array parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<serde_json::Value>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            items: None,
        }
    }

    #[must_use]
    pub fn with_items(mut self, items: serde_json::Value) -> Self {
        self.items = Some(items);
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Render the parameters as a JSON Schema object
    pub fn parameters_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut property = serde_json::json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(items) = &param.items {
                property["items"] = items.clone();
            }
            properties.insert(param.name.clone(), property);
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Typed arguments decoded from the model's payload
    type Args: DeserializeOwned + Send;

    /// JSON-serializable output
    type Output: Serialize;

    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with decoded arguments
    async fn call(&self, args: Self::Args) -> Result<Self::Output>;
}

/// Object-safe view of a tool, operating on raw JSON
#[async_trait]
trait DynTool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    async fn call_json(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

struct TypedTool<T>(T);

#[async_trait]
impl<T: Tool> DynTool for TypedTool<T> {
    fn schema(&self) -> ToolSchema {
        self.0.schema()
    }

    async fn call_json(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let args: T::Args = serde_json::from_value(arguments)
            .map_err(|e| AgentError::ToolValidation(e.to_string()))?;
        let output = self.0.call(args).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn DynTool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry pre-populated with the terminal tool
    pub fn with_final_answer() -> Self {
        let mut registry = Self::new();
        registry.register(FinalAnswerTool);
        registry
    }

    /// Register a new tool
    pub fn register<T: Tool>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name, Arc::new(TypedTool(tool)));
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool call. Failures become an error observation, never an `Err`.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        let outcome = match self.tools.get(&call.name) {
            Some(tool) => tool.call_json(call.arguments.clone()).await,
            None => Err(AgentError::ToolNotFound(call.name.clone())),
        };

        match outcome {
            Ok(data) => ToolResult::success(call, data),
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %e, "Tool call failed");
                ToolResult::failure(call, &e)
            }
        }
    }

    /// Get all tool schemas, sorted by name for a stable prompt
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Terminal Tool
// ============================================================================

/// Final answer payload, also the loop's return value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub answer: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl FinalAnswer {
    /// Answer returned when the loop ends without a terminal call
    pub fn fallback(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            tools_used: Vec::new(),
        }
    }
}

/// Terminal tool - pure, its invocation ends the reasoning loop
pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    type Args = FinalAnswer;
    type Output = FinalAnswer;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: FINAL_ANSWER.into(),
            description: "Use this tool to provide a final answer to the user.".into(),
            parameters: vec![
                ParameterSchema::required("answer", "string", "The answer shown to the user"),
                ParameterSchema::required(
                    "tools_used",
                    "array",
                    "Names of the tools used to produce the answer",
                )
                .with_items(serde_json::json!({"type": "string"})),
            ],
        }
    }

    async fn call(&self, args: FinalAnswer) -> Result<FinalAnswer> {
        Ok(args)
    }
}
