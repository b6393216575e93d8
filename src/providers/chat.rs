//! Chat completions via an OpenAI-compatible API

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::UpstreamError;
use crate::config::StoryConfig;

/// Chat message for the LLM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// `null` when the model produced nothing
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

/// Requested response format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completion client
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatResponse {
    /// Content of the first choice, `None` when it is `null` or empty
    fn into_content(self) -> Result<Option<String>, UpstreamError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Malformed("response has no choices".to_string()))?;
        Ok(choice.message.content.filter(|content| !content.is_empty()))
    }
}

impl ChatClient {
    /// Create a client from the story provider config
    pub fn new(config: &StoryConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Check if an API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send a chat completion request
    ///
    /// Returns the first choice's content, `None` if the message is empty.
    /// A response without any choice is malformed.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        format: ResponseFormat,
    ) -> Result<Option<String>, UpstreamError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(UpstreamError::NotConfigured("story model"))?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: format,
        };

        debug!("Sending chat request for model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Chat API error: {} - {}", status, body);
            return Err(UpstreamError::Status { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        chat_response.into_content()
    }
}
