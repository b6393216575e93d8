//! Comic story generation
//!
//! The story model turns a free-text idea into a script of captioned panels,
//! each carrying the image prompt for that panel.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::providers::{ChatClient, ChatMessage, ResponseFormat, UpstreamError};

/// Fixed instruction sent ahead of every user prompt
pub const SYSTEM_PROMPT: &str = r#"
You are a comic story writer. Create a 3 panel comic about a bunny's adventure, where each panel provides
an image generation prompt that includes 'SNOWBUNNY' and ends with 'cartoon style', and a caption referring to
the bunny as 'Snow'. Return the comic as a JSON with this format:
{
    "comics": [
        {
            "prompt": "Image generation prompt here",
            "caption": "Caption text here"
        }
    ]
}
"#;

/// One comic panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub prompt: String,
    pub caption: String,
    /// Filled in once the panel's image has been generated
    #[serde(
        rename = "imageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

impl Panel {
    pub fn new(prompt: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            caption: caption.into(),
            image_url: None,
        }
    }
}

/// Ordered panels as produced by the story model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicScript {
    pub comics: Vec<Panel>,
}

impl ComicScript {
    /// Parse the model's JSON text
    ///
    /// The text must be an object with a `comics` array of `{prompt, caption}`.
    pub fn parse(content: &str) -> Result<Self, StoryError> {
        serde_json::from_str(content).map_err(StoryError::Malformed)
    }
}

/// Story generation errors
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("story model returned no content")]
    NoContent,

    #[error("story model returned malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("story model request failed: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Ask the story model for a comic script
pub async fn generate_story(chat: &ChatClient, prompt: &str) -> Result<ComicScript, StoryError> {
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

    debug!("Requesting comic script");
    let content = chat
        .complete(&messages, ResponseFormat::JsonObject)
        .await?
        .ok_or(StoryError::NoContent)?;

    let script = ComicScript::parse(&content)?;
    info!("Generated comic script with {} panels", script.comics.len());
    Ok(script)
}
