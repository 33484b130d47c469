//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` over the `/chat/completions` endpoint with
//! server-sent-event streaming and tool calling. Works with OpenAI, OpenRouter,
//! Ollama's `/v1` API and other compatible servers.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, StreamChunk,
        TokenUsage, ToolCallDelta, ToolChoice,
    },
    tool::ToolSchema,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base URL, including the version path
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY is not set".into()))?;
        let defaults = Self::default();
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Ok(Self {
            base_url,
            api_key,
            timeout_secs,
        })
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(name: impl Into<String>, mut config: OpenAiConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            client,
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config("openai", OpenAiConfig::from_env()?)
    }

    /// OpenAI with the given key
    pub fn openai(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(
            "openai",
            OpenAiConfig {
                api_key: api_key.into(),
                ..Default::default()
            },
        )
    }

    /// Local Ollama through its OpenAI-compatible API
    pub fn ollama(base_url: Option<&str>) -> Result<Self> {
        Self::from_config(
            "ollama",
            OpenAiConfig {
                base_url: base_url.unwrap_or("http://localhost:11434/v1").into(),
                api_key: "ollama".into(),
                ..Default::default()
            },
        )
    }

    /// Convert agent messages to the wire format
    fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::Human => "user",
                    Role::Ai => "assistant",
                    Role::Tool => "tool",
                },
                content: m.content.clone(),
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|c| ApiToolCall {
                        id: c.id.clone(),
                        kind: "function",
                        function: ApiFunction {
                            name: c.name.clone(),
                            arguments: match &c.arguments {
                                serde_json::Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect(),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool schemas to function definitions
    fn convert_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_json_schema(),
                    }
                })
            })
            .collect()
    }

    /// Build the streaming request body
    fn build_body(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": options.model,
            "messages": Self::convert_messages(messages),
            "temperature": options.temperature,
            "stream": true,
        });

        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(Self::convert_tools(tools));
            body["tool_choice"] = serde_json::json!(match options.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::Required => "required",
                ToolChoice::None => "none",
            });
        }
        body
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }
}

fn map_send_error(e: &reqwest::Error) -> AgentError {
    if e.is_connect() || e.is_timeout() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Provider(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = %body, "Provider returned an error");
    Err(match status.as_u16() {
        401 | 403 => AgentError::Auth("Invalid API key or insufficient permissions".into()),
        429 => AgentError::RateLimited(body),
        code => AgentError::Provider(format!("HTTP {code}: {body}")),
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("{} health check failed: {}", self.name, e);
                Ok(false)
            }
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let body = Self::build_body(messages, tools, options);
        tracing::debug!(provider = %self.name, model = %options.model, "Sending streaming request");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider = self.name.clone();

        tokio::spawn(async move {
            let mut events = std::pin::pin!(decode_sse(response.bytes_stream()));

            while let Some(next) = events.next().await {
                match next {
                    Ok(SseEvent::Done) => return,
                    Ok(SseEvent::Chunk(chunk)) => {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Ok(SseEvent::Invalid { data, error }) => {
                        tracing::trace!(provider = %provider, %data, %error, "Ignoring unparseable SSE chunk");
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        let response = check_status(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }
}

// ============================================================================
// Server-Sent Events
// ============================================================================

/// One decoded event payload
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Invalid { data: String, error: String },
}

/// Decode an SSE byte stream into events
///
/// Framing and UTF-8 decoding happen on the full event, so reads may split
/// lines or multi-byte characters anywhere.
fn decode_sse<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    bytes.eventsource().filter_map(|event| {
        futures::future::ready(match event {
            Ok(event) => parse_event(&event.data).map(Ok),
            Err(e) => Some(Err(AgentError::Provider(e.to_string()))),
        })
    })
}

fn parse_event(data: &str) -> Option<SseEvent> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    Some(match serde_json::from_str::<StreamResponse>(data) {
        Ok(response) => SseEvent::Chunk(response.into_chunk()),
        Err(e) => SseEvent::Invalid {
            data: data.to_string(),
            error: e.to_string(),
        },
    })
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl StreamResponse {
    fn into_chunk(self) -> StreamChunk {
        let usage = self.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let Some(choice) = self.choices.into_iter().next() else {
            return StreamChunk {
                usage,
                ..Default::default()
            };
        };

        StreamChunk {
            content: choice.delta.content,
            tool_calls: choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|d| {
                    let (name, arguments) = d
                        .function
                        .map(|f| (f.name, f.arguments))
                        .unwrap_or_default();
                    ToolCallDelta {
                        index: d.index,
                        id: d.id,
                        name,
                        arguments,
                    }
                })
                .collect(),
            finish_reason: choice.finish_reason,
            usage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ApiDelta,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ApiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{tool::FinalAnswerTool, Tool, ToolCallRequest};

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_message_conversion() {
        let call = ToolCallRequest::new("call_1", "get_food_nutrients", serde_json::json!({"query": "rice"}));
        let messages = vec![
            Message::system("You are helpful."),
            Message::human("Hello"),
            Message::ai_tool_call(None, call),
            Message::tool("[]", "call_1"),
        ];

        let converted = serde_json::to_value(OpenAiProvider::convert_messages(&messages)).unwrap();
        assert_eq!(converted[1]["role"], "user");
        assert_eq!(converted[2]["role"], "assistant");
        assert!(converted[2]["content"].is_null());
        assert_eq!(converted[2]["tool_calls"][0]["type"], "function");
        assert_eq!(
            converted[2]["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"rice\"}"
        );
        assert_eq!(converted[3]["tool_call_id"], "call_1");
        assert!(converted[0].get("tool_calls").is_none());
    }

    #[test]
    fn test_body_forces_tool_use() {
        let options = GenerationOptions {
            tool_choice: ToolChoice::Required,
            max_tokens: Some(512),
            ..Default::default()
        };
        let body = OpenAiProvider::build_body(
            &[Message::human("hi")],
            &[FinalAnswerTool.schema()],
            &options,
        );
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["tools"][0]["function"]["name"], "final_answer");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
    }

    async fn decode(reads: &[&[u8]]) -> Vec<SseEvent> {
        let reads: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
            reads.iter().map(|r| Ok(r.to_vec())).collect();
        decode_sse(futures::stream::iter(reads))
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_sse_tool_call_deltas() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":null,\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",",
            "\"type\":\"function\",\"function\":{\"name\":\"get_food_nutrients\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"query\"}}]}}]}\n\n"
        );
        let events = decode(&[body.as_bytes()]).await;
        assert_eq!(events.len(), 2);

        let SseEvent::Chunk(opening) = &events[0] else {
            panic!("expected chunk");
        };
        assert_eq!(opening.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(opening.tool_calls[0].name.as_deref(), Some("get_food_nutrients"));

        let SseEvent::Chunk(args) = &events[1] else {
            panic!("expected chunk");
        };
        assert_eq!(args.tool_calls[0].id, None);
        assert_eq!(args.tool_calls[0].arguments.as_deref(), Some("{\"query"));
    }

    #[tokio::test]
    async fn test_sse_split_lines_and_done() {
        let events = decode(&[
            b": keep-alive\n\ndata: {\"choices\":[{\"delta\":{},\"fin",
            b"ish_reason\":\"tool_calls\"}]}\r\n\r\ndata: [DONE]\n\n",
        ])
        .await;
        assert_eq!(events.len(), 2);
        let SseEvent::Chunk(last) = &events[0] else {
            panic!("expected chunk");
        };
        assert_eq!(last.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(events[1], SseEvent::Done);
    }

    #[tokio::test]
    async fn test_sse_multibyte_char_split_across_reads() {
        let body = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"Try café\"}}]}}]}\n\n";
        let bytes = body.as_bytes();
        // Split between the two bytes of 'é'
        let split = body.find('é').unwrap() + 1;

        let events = decode(&[&bytes[..split], &bytes[split..]]).await;
        let SseEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.tool_calls[0].arguments.as_deref(), Some("Try café"));
    }

    #[tokio::test]
    async fn test_sse_invalid_payload() {
        let events = decode(&[b"data: {not json}\n\n"]).await;
        assert!(matches!(events[0], SseEvent::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_usage_only_chunk() {
        let events = decode(&[
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n\n",
        ])
        .await;
        let SseEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk");
        };
        assert!(chunk.tool_calls.is_empty());
        assert_eq!(chunk.usage.as_ref().map(|u| u.total_tokens), Some(15));
    }
}
