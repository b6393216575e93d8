//! HTTP API module - generation endpoints

mod error;
mod images;
mod story;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::persistence::PersistenceClient;
use crate::providers::{ChatClient, ImageClient};
pub use error::{ApiError, ErrorResponse};
pub use images::ImageResponse;
pub use story::StoryResponse;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatClient>,
    pub images: Arc<ImageClient>,
    pub persistence: Arc<PersistenceClient>,
}

impl AppState {
    /// Build the provider clients from config
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            chat: Arc::new(ChatClient::new(&config.story)?),
            images: Arc::new(ImageClient::new(&config.image)?),
            persistence: Arc::new(PersistenceClient::new(&config.persistence)?),
        })
    }
}

/// Request body shared by both generation endpoints
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: Option<String>,
}

/// Extract a non-empty prompt from a raw request body
///
/// The body is parsed as JSON whatever its content type; a body that is not
/// a JSON object with a string `prompt` counts as no prompt.
fn require_prompt(body: &[u8]) -> Result<String, ApiError> {
    match serde_json::from_slice::<PromptRequest>(body) {
        Ok(PromptRequest {
            prompt: Some(prompt),
        }) if !prompt.is_empty() => Ok(prompt),
        _ => Err(ApiError::MissingPrompt),
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(story::router())
        .merge(images::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "comicd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        story_model: state.chat.is_configured(),
        image_model: state.images.is_configured(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    story_model: bool,
    image_model: bool,
}
