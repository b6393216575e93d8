//! Image endpoint
//!
//! POST /api/generate-img - Render one panel prompt and record it

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Serialize;

use super::{require_prompt, ApiError, AppState};
use crate::images::generate_panel_image;

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new().route("/api/generate-img", post(generate_img))
}

/// Image response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
}

async fn generate_img(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImageResponse>, ApiError> {
    let prompt = require_prompt(&body)?;
    let image_url = generate_panel_image(&state.images, &state.persistence, &prompt).await?;
    Ok(Json(ImageResponse { image_url }))
}
