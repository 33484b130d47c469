//! Router

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{chat, health_check, history, list_models, reset};
use crate::state::AppState;

pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Agent API
        .route("/api/chat", post(chat))
        .route("/api/chat/history", get(history))
        .route("/api/chat/reset", post(reset))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{self, Body},
        http::{header, Request, StatusCode},
    };
    use futures::StreamExt;
    use serde_json::json;
    use tower::ServiceExt;

    use agent_core::testing::{final_answer_script, tool_calls_script, Script, ScriptedProvider};
    use agent_core::{AgentConfig, HistoryEntry};
    use recipe_advisor::{default_registry, MockFoodDataClient, INITIAL_GREETING};

    use crate::handlers::{HealthResponse, ModelsResponse, ResetResponse};

    fn app(scripts: Vec<Script>) -> (Router, AppState) {
        let provider = Arc::new(ScriptedProvider::new(scripts));
        let tools = default_registry(Arc::new(MockFoodDataClient::new()));
        let state = AppState::new(provider, tools, AgentConfig::default(), INITIAL_GREETING);
        let router = router(state.clone(), HeaderValue::from_static("http://localhost:3000"));
        (router, state)
    }

    fn chat_request(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"message": message}).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn history(app: &Router) -> Vec<HistoryEntry> {
        let response = app.clone().oneshot(get("/api/chat/history")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(vec![]);
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.backend, "scripted");
        assert!(health.backend_connected);
    }

    #[tokio::test]
    async fn test_models() {
        let (app, _) = app(vec![]);
        let response = app.oneshot(get("/api/models")).await.unwrap();
        let models: ModelsResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(models.models[0].id, "scripted");
    }

    #[tokio::test]
    async fn test_chat_streams_step_frames() {
        let (app, _) = app(vec![
            tool_calls_script(&[("call_1", "get_food_nutrients", json!({"query": "chicken"}))]),
            final_answer_script(
                "call_2",
                "Try swapping white rice for brown rice.",
                &["get_food_nutrients"],
            ),
        ]);

        let response = app.clone().oneshot(chat_request("chicken and rice")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let body = body_text(response).await;
        assert!(body.starts_with("<step><step_name>get_food_nutrients</step_name>"));
        assert_eq!(body.matches("</step>").count(), 1);
        assert!(body.contains("<step><step_name>final_answer</step_name>"));
        assert!(body.contains("Try swapping white rice for brown rice."));

        let entries = history(&app).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].content, "chicken and rice");
        assert_eq!(entries[2].content, "Try swapping white rice for brown rice.");
    }

    #[tokio::test]
    async fn test_model_failure_still_closes_stream() {
        let (app, _) = app(vec![Script::Fail("upstream unavailable".into())]);

        let response = app.clone().oneshot(chat_request("pancakes")).await.unwrap();
        let body = body_text(response).await;
        assert!(body.contains("<step><step_name>final_answer</step_name>"));
        assert!(body.contains("No answer found"));

        let entries = history(&app).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].content, "No answer found");
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (app, _) = app(vec![]);
        let response = app.oneshot(chat_request("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_starts_with_greeting() {
        let (app, _) = app(vec![]);
        let entries = history(&app).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, INITIAL_GREETING);
    }

    #[tokio::test]
    async fn test_reset_restores_greeting() {
        let (app, _) = app(vec![final_answer_script("call_1", "Use less butter.", &[])]);
        let response = app.clone().oneshot(chat_request("cookies")).await.unwrap();
        body_text(response).await;
        assert_eq!(history(&app).await.len(), 3);

        for _ in 0..2 {
            let request = Request::builder()
                .method("POST")
                .uri("/api/chat/reset")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            let reset: ResetResponse = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(reset.status, "ok");
        }

        let entries = history(&app).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, INITIAL_GREETING);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_turn_without_commit() {
        let (app, state) = app(vec![]);
        state.shutdown.cancel();

        let response = app.clone().oneshot(chat_request("soup")).await.unwrap();
        let body = body_text(response).await;
        assert!(body.contains("No answer found"));
        assert_eq!(history(&app).await.len(), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_still_commits_turn() {
        let (app, state) = app(vec![
            tool_calls_script(&[("call_1", "get_food_nutrients", json!({"query": "rice"}))]),
            final_answer_script("call_2", "Use brown rice.", &["get_food_nutrients"]),
        ]);

        let response = app.oneshot(chat_request("rice bowl")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"<step>"));
        drop(body);

        // The first frame means the turn holds the lock; wait for it to finish
        let conversation = state.conversation.lock().await;
        let entries = conversation.history_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].content, "Use brown rice.");
    }
}
