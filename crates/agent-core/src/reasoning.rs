//! Reasoning Loop
//!
//! Drives the model through repeated "call tools → observe → call again"
//! cycles until the terminal tool is called or the iteration cap is hit.
//!
//! ```text
//!   AwaitingModel ──▶ ExecutingTools ──▶ AwaitingModel ...
//!        │                  │
//!        └──────────────────┴──▶ Terminal
//! ```

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::assembler::{ReassembledCall, ToolCallAssembler};
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider, ToolChoice};
use crate::session::ConversationState;
use crate::stream::{StepMonitor, StreamHandler};
use crate::tool::{FinalAnswer, FinalAnswerTool, ToolRegistry, ToolResult, ToolSchema, FINAL_ANSWER};

/// Default answer when a turn ends without a terminal call
pub const FALLBACK_ANSWER: &str = "No answer found";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt
    pub system_prompt: String,

    /// Maximum model invocations per turn
    pub max_iterations: usize,

    /// Generation options (tool choice is always forced to `Required`)
    pub generation: GenerationOptions,

    /// Name of the tool whose call ends the loop
    pub terminal_tool: String,

    /// Answer used when the loop ends without a terminal call
    pub fallback_answer: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 20,
            generation: GenerationOptions::default(),
            terminal_tool: FINAL_ANSWER.into(),
            fallback_answer: FALLBACK_ANSWER.into(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Use the available tools to gather what you need, then always reply through the \
`final_answer` tool.";

#[derive(Debug)]
enum AgentState {
    AwaitingModel,
    ExecutingTools(Vec<ReassembledCall>),
    Terminal(TurnOutcome),
}

#[derive(Debug)]
enum TurnOutcome {
    Answered(FinalAnswer),
    Exhausted,
    Failed(AgentError),
    Cancelled,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run one turn for `input`, streaming deltas through `handler`
    ///
    /// Always returns an answer: model failures and iteration exhaustion yield
    /// the fallback. Completed turns commit exactly two history messages;
    /// cancelled turns commit nothing.
    pub async fn invoke(
        &self,
        state: &mut ConversationState,
        input: &str,
        handler: &StreamHandler,
        cancel: &CancellationToken,
    ) -> FinalAnswer {
        let span = tracing::info_span!("turn", conversation = %state.id());
        state.begin_turn();

        let outcome = self
            .run_loop(state, input, handler, cancel)
            .instrument(span)
            .await;

        let answer = match outcome {
            TurnOutcome::Answered(answer) => answer,
            TurnOutcome::Exhausted => {
                tracing::warn!(
                    max_iterations = self.config.max_iterations,
                    "No final answer within the iteration limit"
                );
                self.fallback(handler)
            }
            TurnOutcome::Failed(e) => {
                tracing::error!(error = %e, "Model invocation failed");
                self.fallback(handler)
            }
            TurnOutcome::Cancelled => {
                tracing::info!("Turn cancelled");
                state.discard_scratchpad();
                return self.fallback(handler);
            }
        };

        state.append_turn(input, answer.answer.clone());
        answer
    }

    fn fallback(&self, handler: &StreamHandler) -> FinalAnswer {
        let answer = FinalAnswer::fallback(self.config.fallback_answer.clone());
        handler.emit_answer(&answer);
        answer
    }

    async fn run_loop(
        &self,
        state: &mut ConversationState,
        input: &str,
        handler: &StreamHandler,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let schemas = self.tools.schemas();
        let options = GenerationOptions {
            tool_choice: ToolChoice::Required,
            ..self.config.generation.clone()
        };

        let mut iterations = 0;
        let mut current = AgentState::AwaitingModel;

        loop {
            current = match current {
                AgentState::AwaitingModel if iterations >= self.config.max_iterations => {
                    AgentState::Terminal(TurnOutcome::Exhausted)
                }
                AgentState::AwaitingModel => {
                    let messages = self.build_context(state, input);
                    match self
                        .stream_step(&messages, &schemas, &options, handler, cancel)
                        .await
                    {
                        Ok(calls) => AgentState::ExecutingTools(calls),
                        Err(AgentError::Cancelled) => AgentState::Terminal(TurnOutcome::Cancelled),
                        Err(e) => AgentState::Terminal(TurnOutcome::Failed(e)),
                    }
                }
                AgentState::ExecutingTools(calls) => {
                    let results = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return TurnOutcome::Cancelled;
                        }
                        results = self.execute_batch(&calls) => results,
                    };

                    let answer = self.terminal_answer(&calls);
                    for (call, result) in calls.into_iter().zip(&results) {
                        state.record_call(call.content, call.request, result);
                    }
                    iterations += 1;

                    match answer {
                        Some(answer) => AgentState::Terminal(TurnOutcome::Answered(answer)),
                        None => AgentState::AwaitingModel,
                    }
                }
                AgentState::Terminal(outcome) => return outcome,
            };
        }
    }

    /// System prompt, committed history, the current input, then the scratchpad
    fn build_context(&self, state: &ConversationState, input: &str) -> Vec<Message> {
        let history = state.history();
        let scratchpad = state.scratchpad();

        tracing::debug!(
            input_len = input.len(),
            history_messages = history.len(),
            scratchpad_messages = scratchpad.len(),
            "Building model context"
        );
        for (i, msg) in history.iter().enumerate() {
            tracing::trace!(index = i, tokens = msg.estimate_tokens(), "History message");
        }
        for (i, msg) in scratchpad.iter().enumerate() {
            tracing::trace!(index = i, tokens = msg.estimate_tokens(), "Scratchpad message");
        }

        let mut messages = Vec::with_capacity(history.len() + scratchpad.len() + 2);
        messages.push(Message::system(self.config.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(Message::human(input));
        messages.extend_from_slice(scratchpad);
        messages
    }

    /// One streamed model invocation, reassembled into tool calls
    async fn stream_step(
        &self,
        messages: &[Message],
        schemas: &[ToolSchema],
        options: &GenerationOptions,
        handler: &StreamHandler,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReassembledCall>> {
        let mut monitor = handler.begin_step();
        match self
            .collect_deltas(messages, schemas, options, &mut monitor, cancel)
            .await
        {
            Ok(calls) => {
                monitor.finish();
                Ok(calls)
            }
            Err(e) => {
                monitor.abort();
                Err(e)
            }
        }
    }

    async fn collect_deltas(
        &self,
        messages: &[Message],
        schemas: &[ToolSchema],
        options: &GenerationOptions,
        monitor: &mut StepMonitor<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReassembledCall>> {
        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.provider.complete_stream(messages, schemas, options) => stream?,
        };

        let mut assembler = ToolCallAssembler::new();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    assembler.push(&chunk);
                    monitor.on_delta(chunk);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        let calls = assembler.finish();
        tracing::debug!(
            provider = self.provider.name(),
            calls = calls.len(),
            "Model step complete"
        );
        Ok(calls)
    }

    /// Run every call concurrently; results keep request order
    async fn execute_batch(&self, calls: &[ReassembledCall]) -> Vec<ToolResult> {
        let dispatches = calls.iter().map(|call| async move {
            match &call.error {
                Some(error) => {
                    tracing::warn!(tool = %call.request.name, id = %call.request.id, %error, "Skipping malformed tool call");
                    ToolResult::failure(&call.request, &AgentError::Parse(error.clone()))
                }
                None => {
                    tracing::info!(tool = %call.request.name, id = %call.request.id, "Executing tool");
                    self.tools.execute(&call.request).await
                }
            }
        });
        futures::future::join_all(dispatches).await
    }

    /// First terminal call in request order supplies the answer
    fn terminal_answer(&self, calls: &[ReassembledCall]) -> Option<FinalAnswer> {
        let call = calls
            .iter()
            .find(|c| c.request.name == self.config.terminal_tool)?;

        let decoded = if call.is_malformed() {
            None
        } else {
            serde_json::from_value::<FinalAnswer>(call.request.arguments.clone()).ok()
        };

        Some(decoded.unwrap_or_else(|| {
            tracing::warn!(id = %call.request.id, "Terminal tool called with unusable arguments");
            FinalAnswer::fallback(self.config.fallback_answer.clone())
        }))
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: crate::tool::Tool>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub fn fallback_answer(mut self, answer: impl Into<String>) -> Self {
        self.config.fallback_answer = answer.into();
        self
    }

    pub fn build(mut self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if !self.tools.contains(&self.config.terminal_tool) {
            if self.config.terminal_tool != FINAL_ANSWER {
                return Err(AgentError::Config(format!(
                    "Terminal tool '{}' is not registered",
                    self.config.terminal_tool
                )));
            }
            self.tools.register(FinalAnswerTool);
        }

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
