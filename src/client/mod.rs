//! Comic creator client
//!
//! Provides:
//! - `ApiClient` for the story and image endpoints of a running server
//! - `Board`, the panel/history state and the generation flow over it
//! - `view`, text rendering of board state

mod board;
pub mod view;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::story::ComicScript;

pub use board::{Board, BoardState, Outcome};

/// Client-side errors; the display text is what the error banner shows
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Api(String),

    #[error("Invalid story format received")]
    InvalidStory,

    #[error("Image URL not allowed: {0}")]
    DisallowedImageHost(String),
}

#[derive(Debug, Deserialize)]
struct ImageBody {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

/// HTTP client for the comicd generation endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the server for a comic script
    pub async fn generate_story(&self, prompt: &str) -> Result<ComicScript, ClientError> {
        let body = self
            .post("/api/generate-story", prompt, "Failed to generate story")
            .await?;
        debug!("Story data: {}", body);

        let comics = body
            .get("result")
            .and_then(|r| r.get("comics"))
            .filter(|c| c.is_array())
            .ok_or(ClientError::InvalidStory)?;

        let comics = serde_json::from_value(comics.clone()).map_err(|_| ClientError::InvalidStory)?;
        Ok(ComicScript { comics })
    }

    /// Ask the server for one panel image, returning its URL
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ClientError> {
        let body = self
            .post("/api/generate-img", prompt, "Failed to generate image")
            .await?;

        let image: ImageBody =
            serde_json::from_value(body).map_err(|e| ClientError::Api(e.to_string()))?;
        Ok(image.image_url)
    }

    /// POST `{prompt}` and return the JSON body of a successful response
    async fn post(&self, path: &str, prompt: &str, fallback: &str) -> Result<Value, ClientError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;

        let ok = response.status().is_success();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !ok {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string();
            return Err(ClientError::Api(message));
        }

        Ok(body)
    }
}
