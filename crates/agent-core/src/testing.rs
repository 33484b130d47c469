//! Scripted Provider
//!
//! Deterministic `LlmProvider` that replays prepared delta scripts, one per
//! model invocation. For tests and offline demos.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{
    CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, StreamChunk,
    ToolCallDelta,
};
use crate::tool::{FinalAnswer, ToolSchema, FINAL_ANSWER};

/// What one model invocation produces
#[derive(Clone, Debug)]
pub enum Script {
    /// Stream these deltas, then end normally
    Chunks(Vec<StreamChunk>),
    /// Fail before streaming anything
    Fail(String),
    /// Stream these deltas, then fail mid-stream
    FailAfter(Vec<StreamChunk>, String),
}

/// A request the provider received
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub options: GenerationOptions,
}

/// Provider replaying scripts in order
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    repeat: Option<Script>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Provider that answers every invocation with the same script
    pub fn repeating(script: Script) -> Self {
        Self {
            repeat: Some(script),
            ..Default::default()
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of model invocations so far
    pub fn invocations(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_script(&self) -> Option<Script> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .or_else(|| self.repeat.clone())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
                options: options.clone(),
            });

        let (chunks, failure) = match self.next_script() {
            Some(Script::Chunks(chunks)) => (chunks, None),
            Some(Script::Fail(error)) => return Err(AgentError::Provider(error)),
            Some(Script::FailAfter(chunks, error)) => (chunks, Some(error)),
            None => return Err(AgentError::Provider("script exhausted".into())),
        };

        let items = chunks
            .into_iter()
            .map(Ok)
            .chain(failure.map(|e| Err(AgentError::Provider(e))));
        Ok(Box::pin(futures::stream::iter(items.collect::<Vec<_>>())))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted".into(),
            owned_by: None,
        }])
    }
}

/// Deltas for one tool call, arguments split into small fragments
pub fn tool_call_chunks(
    index: u32,
    id: &str,
    name: &str,
    arguments: &serde_json::Value,
) -> Vec<StreamChunk> {
    let text = arguments.to_string();
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = vec![StreamChunk::tool_call(ToolCallDelta::open(index, id, name))];
    chunks.extend(
        chars
            .chunks(8)
            .map(|piece| StreamChunk::tool_call(ToolCallDelta::args(index, piece.iter().collect::<String>()))),
    );
    chunks
}

/// One model turn emitting the given calls in order
pub fn tool_calls_script(calls: &[(&str, &str, serde_json::Value)]) -> Script {
    let mut chunks = Vec::new();
    for (index, (id, name, arguments)) in (0u32..).zip(calls) {
        chunks.extend(tool_call_chunks(index, id, name, arguments));
    }
    chunks.push(StreamChunk {
        finish_reason: Some(FinishReason::ToolCalls),
        ..Default::default()
    });
    Script::Chunks(chunks)
}

/// One model turn calling the terminal tool
pub fn final_answer_script(id: &str, answer: &str, tools_used: &[&str]) -> Script {
    let payload = FinalAnswer {
        answer: answer.into(),
        tools_used: tools_used.iter().map(ToString::to_string).collect(),
    };
    let arguments = serde_json::to_value(payload).unwrap_or_default();
    tool_calls_script(&[(id, FINAL_ANSWER, arguments)])
}
