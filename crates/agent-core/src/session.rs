//! Session Management
//!
//! Committed chat history across turns plus the current turn's scratchpad.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{HistoryEntry, Message, ToolCallRequest};
use crate::tool::ToolResult;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation state owned by one conversation
///
/// Only the reasoning loop mutates it during a turn; `reset` is for use
/// between turns.
#[derive(Clone, Debug)]
pub struct ConversationState {
    id: SessionId,
    greeting: String,
    history: Vec<Message>,
    scratchpad: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a conversation whose history starts with an AI greeting
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            history: vec![Message::ai(greeting.clone())],
            greeting,
            scratchpad: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Committed cross-turn history
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Current turn's tool-call/tool-result pairs
    pub fn scratchpad(&self) -> &[Message] {
        &self.scratchpad
    }

    /// Start a turn with an empty scratchpad
    pub fn begin_turn(&mut self) {
        self.scratchpad.clear();
    }

    /// Record one tool call followed by its result
    pub fn record_step(&mut self, request: Message, result: &ToolResult) {
        self.scratchpad.push(request);
        self.scratchpad.push(Message::tool(result.output.clone(), result.id.clone()));
    }

    /// Record a call and its result from their parts
    pub fn record_call(&mut self, content: Option<String>, call: ToolCallRequest, result: &ToolResult) {
        self.record_step(Message::ai_tool_call(content, call), result);
    }

    pub fn discard_scratchpad(&mut self) {
        self.scratchpad.clear();
    }

    /// Commit a completed turn: the human input, then the AI answer
    pub fn append_turn(&mut self, user_input: impl Into<String>, final_answer: impl Into<String>) {
        self.history.push(Message::human(user_input));
        self.history.push(Message::ai(final_answer));
        self.scratchpad.clear();
        self.touch();
    }

    /// Restore history to the greeting alone and drop any scratchpad
    pub fn reset(&mut self) {
        self.history.clear();
        self.history.push(Message::ai(self.greeting.clone()));
        self.scratchpad.clear();
        self.touch();
    }

    /// Serializable `[{content, role}]` view of the history
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.iter().map(HistoryEntry::from).collect()
    }

    /// Number of committed messages
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// Time between creation and the last change
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
