//! API error responses
//!
//! Every failure is logged here with its full cause; the client only sees
//! the generic message under `{"error": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::images::ImageError;
use crate::story::StoryError;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by the generation endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("No prompts generated")]
    NoPrompts,

    #[error("Failed to generate story")]
    Story(#[source] StoryError),

    #[error("Failed to generate image")]
    Image(#[from] ImageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingPrompt | ApiError::NoPrompts => StatusCode::BAD_REQUEST,
            ApiError::Story(_) | ApiError::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(err: StoryError) -> Self {
        match err {
            StoryError::NoContent => ApiError::NoPrompts,
            other => ApiError::Story(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::MissingPrompt => warn!("Rejected request without prompt"),
            ApiError::NoPrompts => warn!("Story model returned no prompts"),
            ApiError::Story(e) => error!("Error generating story: {}", e),
            ApiError::Image(e) => error!("Error generating image: {}", e),
        }

        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
