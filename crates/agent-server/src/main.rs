//! Recipe Advisor HTTP Server
//!
//! Axum-based server streaming agent turns as step frames.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentConfig, GenerationOptions, LlmProvider};
use agent_runtime::OpenAiProvider;
use recipe_advisor::{
    default_registry, FoodDataClient, MockFoodDataClient, UsdaClient, INITIAL_GREETING,
    RECIPE_ADVISOR_PROMPT,
};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider: Arc<dyn LlmProvider> = match OpenAiProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::warn!("⚠ OpenAI not configured ({}), using local Ollama", e);
            tracing::warn!("  Set OPENAI_API_KEY in .env or run: ollama serve");
            Arc::new(OpenAiProvider::ollama(None)?)
        }
    };

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to {}", provider.name()),
        Ok(false) | Err(_) => tracing::warn!("⚠ {} not reachable - turns will fail", provider.name()),
    }

    // Nutrient data source
    let food_data: Arc<dyn FoodDataClient> = match UsdaClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!("⚠ {} - using built-in nutrient table", e);
            Arc::new(MockFoodDataClient::new())
        }
    };
    tracing::info!("✓ Nutrient source: {}", food_data.name());

    let tools = default_registry(food_data);
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent_config = AgentConfig {
        system_prompt: RECIPE_ADVISOR_PROMPT.into(),
        max_iterations: config.max_iterations,
        generation: GenerationOptions {
            model: config.model.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    let state = AppState::new(provider, tools, agent_config, INITIAL_GREETING);
    let shutdown = state.shutdown.clone();
    let app = routes::router(state, config.allowed_origin.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 recipe advisor running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Model: {} (max {} iterations)", config.model, config.max_iterations);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/models       - List available models");
    tracing::info!("  POST /api/chat         - Send message (streamed)");
    tracing::info!("  GET  /api/chat/history - Conversation history");
    tracing::info!("  POST /api/chat/reset   - Reset conversation");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then cancel in-flight turns
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}
