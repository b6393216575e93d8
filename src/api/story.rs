//! Story endpoint
//!
//! POST /api/generate-story - Expand a story idea into a comic script

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Serialize;

use super::{require_prompt, ApiError, AppState};
use crate::story::{self, ComicScript};

/// Build the story router
pub fn router() -> Router<AppState> {
    Router::new().route("/api/generate-story", post(generate_story))
}

/// Story response
#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub result: ComicScript,
}

async fn generate_story(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StoryResponse>, ApiError> {
    let prompt = require_prompt(&body)?;
    let result = story::generate_story(&state.chat, &prompt).await?;
    Ok(Json(StoryResponse { result }))
}
