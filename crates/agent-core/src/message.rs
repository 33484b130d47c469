//! Conversation Messages
//!
//! Standard message format used across the agent system. AI messages may carry
//! tool call requests; tool messages point back at the request they answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    Human,
    /// Model response
    Ai,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Human => write!(f, "human"),
            Self::Ai => write!(f, "ai"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A complete tool call emitted by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique call identifier assigned by the model
    pub id: String,

    /// Name of the tool to dispatch to
    pub name: String,

    /// Decoded argument payload
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content (absent for pure tool-call messages)
    pub content: Option<String>,

    /// Tool calls requested by an AI message, in emission order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Originating call id (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new text message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    /// Create an AI text message
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    /// Create an AI message carrying a single tool call
    pub fn ai_tool_call(content: Option<String>, call: ToolCallRequest) -> Self {
        Self {
            role: Role::Ai,
            content: content.filter(|c| !c.is_empty()),
            tool_calls: vec![call],
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            timestamp: Utc::now(),
        }
    }

    /// Text content, or an empty string for pure tool-call messages
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        let calls: usize = self
            .tool_calls
            .iter()
            .map(|c| c.name.len() + c.arguments.to_string().len())
            .sum();
        // ~4 characters per token, +4 for role overhead
        u32::try_from((self.text().len() + calls) / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// Serializable view of a committed history message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub content: String,
    pub role: Role,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            content: message.text().to_string(),
            role: message.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::human("Hello");
        assert_eq!(msg.role, Role::Human);
        assert_eq!(msg.text(), "Hello");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_call_message_has_no_content() {
        let call = ToolCallRequest::new("call_1", "get_food_nutrients", serde_json::json!({"query": "rice"}));
        let msg = Message::ai_tool_call(Some(String::new()), call);
        assert!(msg.content.is_none());
        assert_eq!(msg.text(), "");
        assert_eq!(msg.tool_calls[0].id, "call_1");
    }

    #[test]
    fn test_history_entry_serialization() {
        let entry = HistoryEntry::from(&Message::ai("Hi there"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"content": "Hi there", "role": "ai"}));
    }
}
