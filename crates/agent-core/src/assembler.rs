//! Tool Call Reassembly
//!
//! Folds streamed deltas back into complete tool calls. A fragment carrying a
//! new non-empty id opens a call; every later fragment without one is appended
//! to the most recently opened call.

use crate::message::ToolCallRequest;
use crate::provider::StreamChunk;

/// A tool call whose arguments are still streaming
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub content: String,
}

impl PartialToolCall {
    /// Parse the accumulated argument text
    pub fn complete(self) -> ReassembledCall {
        let content = (!self.content.is_empty()).then_some(self.content);
        let raw = self.arguments.trim();

        let parsed = if self.name.is_empty() {
            Err("missing function name".to_string())
        } else if raw.is_empty() {
            Ok(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|e| format!("malformed arguments for `{}`: {e}", self.name))
        };

        match parsed {
            Ok(arguments) => ReassembledCall {
                request: ToolCallRequest::new(self.id, self.name, arguments),
                content,
                error: None,
            },
            Err(error) => ReassembledCall {
                request: ToolCallRequest::new(
                    self.id,
                    self.name,
                    serde_json::Value::String(self.arguments),
                ),
                content,
                error: Some(error),
            },
        }
    }
}

/// Outcome of reassembling one call
#[derive(Clone, Debug, PartialEq)]
pub struct ReassembledCall {
    /// The call; raw argument text is kept as a JSON string when unparseable
    pub request: ToolCallRequest,

    /// Text the model emitted alongside the call
    pub content: Option<String>,

    /// Why the call cannot be dispatched
    pub error: Option<String>,
}

impl ReassembledCall {
    pub const fn is_malformed(&self) -> bool {
        self.error.is_some()
    }
}

/// Accumulator for one model invocation
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: Vec<PartialToolCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the accumulated calls
    pub fn push(&mut self, chunk: &StreamChunk) {
        for delta in &chunk.tool_calls {
            match delta.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => self.calls.push(PartialToolCall {
                    id: id.to_string(),
                    name: delta.name.clone().unwrap_or_default(),
                    arguments: delta.arguments.clone().unwrap_or_default(),
                    content: String::new(),
                }),
                None => {
                    let Some(call) = self.calls.last_mut() else {
                        tracing::debug!("Dropping tool call fragment received before any call id");
                        continue;
                    };
                    if let Some(name) = &delta.name {
                        call.name.push_str(name);
                    }
                    if let Some(arguments) = &delta.arguments {
                        call.arguments.push_str(arguments);
                    }
                }
            }
        }

        if chunk.tool_calls.is_empty() {
            return;
        }
        if let (Some(text), Some(call)) = (chunk.content.as_deref(), self.calls.last_mut()) {
            call.content.push_str(text);
        }
    }

    /// Number of calls opened so far
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Complete every call, in emission order
    pub fn finish(self) -> Vec<ReassembledCall> {
        self.calls.into_iter().map(PartialToolCall::complete).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolCallDelta;

    fn push_all(chunks: &[StreamChunk]) -> Vec<ReassembledCall> {
        let mut assembler = ToolCallAssembler::new();
        for chunk in chunks {
            assembler.push(chunk);
        }
        assembler.finish()
    }

    #[test]
    fn test_single_call_fragments_concatenate() {
        let calls = push_all(&[
            StreamChunk::tool_call(ToolCallDelta::open(0, "call_1", "get_food_nutrients")),
            StreamChunk::tool_call(ToolCallDelta::args(0, "{\"que")),
            StreamChunk::tool_call(ToolCallDelta::args(0, "ry\": \"rice\"}")),
        ]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].request.id, "call_1");
        assert_eq!(calls[0].request.arguments, serde_json::json!({"query": "rice"}));
        assert!(!calls[0].is_malformed());
    }

    #[test]
    fn test_new_id_opens_parallel_call() {
        let calls = push_all(&[
            StreamChunk::tool_call(ToolCallDelta::open(0, "a", "get_food_nutrients")),
            StreamChunk::tool_call(ToolCallDelta::args(0, "{\"query\":\"rice\"}")),
            StreamChunk::tool_call(ToolCallDelta::open(1, "b", "get_food_nutrients")),
            StreamChunk::tool_call(ToolCallDelta::args(1, "{\"query\":\"chicken\"}")),
        ]);
        let ids: Vec<_> = calls.iter().map(|c| c.request.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(calls[1].request.arguments["query"], "chicken");
    }

    #[test]
    fn test_empty_id_does_not_open_call() {
        let mut delta = ToolCallDelta::args(0, "}");
        delta.id = Some(String::new());
        let calls = push_all(&[
            StreamChunk::tool_call(ToolCallDelta::open(0, "a", "final_answer")),
            StreamChunk::tool_call(ToolCallDelta::args(0, "{")),
            StreamChunk::tool_call(delta),
        ]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].request.arguments, serde_json::json!({}));
    }

    #[test]
    fn test_text_only_chunks_are_ignored() {
        let mut assembler = ToolCallAssembler::new();
        assembler.push(&StreamChunk::text("Let me look that up"));
        assembler.push(&StreamChunk::tool_call(ToolCallDelta::args(0, "{}")));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_malformed_call_fails_alone() {
        let calls = push_all(&[
            StreamChunk::tool_call(ToolCallDelta::open(0, "a", "get_food_nutrients")),
            StreamChunk::tool_call(ToolCallDelta::args(0, "{\"query\": ")),
            StreamChunk::tool_call(ToolCallDelta::open(1, "b", "get_food_nutrients")),
            StreamChunk::tool_call(ToolCallDelta::args(1, "{\"query\": \"oats\"}")),
        ]);
        assert!(calls[0].is_malformed());
        assert_eq!(calls[0].request.arguments, serde_json::json!("{\"query\": "));
        assert!(!calls[1].is_malformed());
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let mut open = ToolCallDelta::open(0, "a", "");
        open.arguments = Some("{}".into());
        let calls = push_all(&[StreamChunk::tool_call(open)]);
        assert_eq!(calls[0].error.as_deref(), Some("missing function name"));
    }
}
