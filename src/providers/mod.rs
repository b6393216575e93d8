//! Hosted model providers
//!
//! Provides:
//! - Chat completions against an OpenAI-compatible API (story model)
//! - Image predictions against a Replicate-style API (image model)

mod chat;
mod replicate;

use reqwest::StatusCode;
use thiserror::Error;

pub use chat::{ChatClient, ChatMessage, ResponseFormat};
pub use replicate::{
    output_to_string, ImageClient, ModelRef, Prediction, PredictionStatus, PredictionUrls,
};

/// Errors talking to a hosted provider
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0} credentials not configured")]
    NotConfigured(&'static str),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("prediction {id} {status}: {message}")]
    PredictionFailed {
        id: String,
        status: PredictionStatus,
        message: String,
    },

    #[error("prediction {0} did not finish in time")]
    Timeout(String),
}
