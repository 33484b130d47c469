//! HTTP Handlers

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use agent_core::{provider::ModelInfo, HistoryEntry, StreamHandler, TokenStream};

use crate::state::AppState;

/// Frames buffered between the forwarder and the response body
const FRAME_BUFFER: usize = 100;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub backend_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Event-stream body carrying step frames
pub struct FrameStream(mpsc::Receiver<String>);

impl IntoResponse for FrameStream {
    fn into_response(self) -> Response {
        let body = ReceiverStream::new(self.0).map(|frame| Ok::<_, Infallible>(Bytes::from(frame)));
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(body),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        backend: state.provider.name().into(),
        backend_connected,
    })
}

/// Models reported by the back-end
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.provider.list_models().await.map_err(|e| {
        tracing::error!("Model listing failed: {}", e);
        api_error(StatusCode::BAD_GATEWAY, "BACKEND_ERROR", e.user_message())
    })?;
    Ok(Json(ModelsResponse { models }))
}

/// Run one agent turn and stream its step frames
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<FrameStream, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "Message must not be empty",
        ));
    }

    let (handler, tokens) = StreamHandler::channel(state.agent.config().terminal_tool.clone());
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);

    let agent = state.agent.clone();
    let conversation = state.conversation.clone();
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        let mut conversation = conversation.lock().await;
        let answer = agent
            .invoke(&mut conversation, &payload.message, &handler, &cancel)
            .await;
        tracing::info!(
            tools_used = ?answer.tools_used,
            history = conversation.message_count(),
            age_secs = conversation.duration().num_seconds(),
            "Turn finished"
        );
    });
    tokio::spawn(forward_frames(tokens, tx));

    Ok(FrameStream(rx))
}

/// Drain the multiplexer into the response body
///
/// Draining continues after the client goes away so the turn still completes.
async fn forward_frames(tokens: TokenStream, tx: mpsc::Sender<String>) {
    let mut frames = std::pin::pin!(tokens.into_frames());
    let mut client_gone = false;

    while let Some(frame) = frames.next().await {
        if client_gone {
            continue;
        }
        if let Err(e) = tx.send(frame).await {
            tracing::warn!("Client disconnected, dropping frames: {}", e);
            client_gone = true;
        }
    }
}

/// Committed conversation history
pub async fn history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let conversation = state.conversation.lock().await;
    Json(conversation.history_entries())
}

/// Restore the conversation to its greeting
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    let mut conversation = state.conversation.lock().await;
    conversation.reset();
    tracing::info!(conversation = %conversation.id(), "Conversation reset");

    Json(ResetResponse {
        status: "ok".into(),
        message: "Conversation has been reset".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{provider::ToolCallDelta, StreamChunk, FINAL_ANSWER};

    #[tokio::test]
    async fn test_forwarder_drains_after_receiver_closed() {
        let (handler, tokens) = StreamHandler::channel(FINAL_ANSWER);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let forwarder = tokio::spawn(forward_frames(tokens, tx));

        let mut step = handler.begin_step();
        step.on_delta(StreamChunk::tool_call(ToolCallDelta::open(0, "a", "get_food_nutrients")));
        step.on_delta(StreamChunk::tool_call(ToolCallDelta::args(0, "{}")));
        step.finish();
        let mut step = handler.begin_step();
        step.on_delta(StreamChunk::tool_call(ToolCallDelta::open(0, "b", FINAL_ANSWER)));
        assert!(step.finish());

        // Completes only once the whole token stream has been consumed
        forwarder.await.unwrap();
    }
}
