//! # agent-core
//!
//! Core agent logic: a provider-agnostic tool-calling loop whose model output
//! is multiplexed to the client token by token.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Agent                               │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider        │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)         │  │
//! │  └──────┬──────┘  └─────────────┘  └──────────────────────┘  │
//! │         │ StepMonitor                                        │
//! │  ┌──────▼──────────────────────┐                             │
//! │  │ StreamHandler ─▶ TokenStream │──▶ step frames              │
//! │  └─────────────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop stops when the model calls the terminal `final_answer` tool or
//! when the iteration cap is reached.

pub mod assembler;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod stream;
pub mod testing;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{HistoryEntry, Message, Role, ToolCallRequest};
pub use provider::{GenerationOptions, LlmProvider, StreamChunk, ToolCallDelta, ToolChoice};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::ConversationState;
pub use stream::{StreamHandler, TokenStream};
pub use tool::{FinalAnswer, Tool, ToolRegistry, ToolResult, ToolSchema, FINAL_ANSWER};
