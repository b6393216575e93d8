//! Panel image pipeline
//!
//! Two-step process:
//! 1. Image model renders the panel prompt
//! 2. Persistence service records `{prompt, image_url}`
//!
//! The URL is only handed back once the save succeeded.

use thiserror::Error;
use tracing::{debug, info};

use crate::persistence::{PersistenceClient, PersistenceError};
use crate::providers::{ImageClient, UpstreamError};

/// Image pipeline errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image model request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Persistence(#[from] PersistenceError),
}

/// Generate one panel image and record it
///
/// Returns the image URL on success
pub async fn generate_panel_image(
    images: &ImageClient,
    persistence: &PersistenceClient,
    prompt: &str,
) -> Result<String, ImageError> {
    debug!("Requesting image for prompt: {}", prompt);
    let image_url = images.generate(prompt).await?;

    debug!("Image generated at URL: {}", image_url);
    persistence.save(prompt, &image_url).await?;

    info!("Panel image generated and saved: {}", image_url);
    Ok(image_url)
}
