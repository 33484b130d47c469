//! Application State

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use agent_core::{Agent, AgentConfig, ConversationState, LlmProvider, ToolRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (OpenAI-compatible back-end)
    pub provider: Arc<dyn LlmProvider>,

    /// Agent driving each chat turn
    pub agent: Arc<Agent>,

    /// The conversation; locked for the whole duration of a turn
    pub conversation: Arc<Mutex<ConversationState>>,

    /// Cancelled on graceful shutdown to stop in-flight turns
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        config: AgentConfig,
        greeting: &str,
    ) -> Self {
        let agent = Agent::new(provider.clone(), Arc::new(tools), config);
        Self {
            provider,
            agent: Arc::new(agent),
            conversation: Arc::new(Mutex::new(ConversationState::new(greeting))),
            shutdown: CancellationToken::new(),
        }
    }
}
