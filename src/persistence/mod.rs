//! Remote persistence service client
//!
//! The service records every generated image (`POST /save`) and serves the
//! history list (`GET /history`). It is owned elsewhere; this side only
//! writes rows and reads them back.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PersistenceConfig;

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to save image: {0}")]
    Save(StatusCode),

    #[error("Failed to fetch history: {0}")]
    History(StatusCode),
}

/// A stored history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub image_url: String,
    /// Timestamp as sent by the service; `None` when null or absent
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
}

/// Accept any JSON value for a timestamp so one odd row doesn't sink the list
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl HistoryEntry {
    /// Calendar date of `created_at`, if it parses
    pub fn created_date(&self) -> Option<NaiveDate> {
        let raw = self.created_at.as_deref()?.trim();

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.date_naive());
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|ts| ts.date())
    }
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    prompt: &'a str,
    image_url: &'a str,
}

/// HTTP client for the persistence service
#[derive(Debug, Clone)]
pub struct PersistenceClient {
    client: Client,
    base_url: String,
}

impl PersistenceClient {
    pub fn new(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Record a generated image
    pub async fn save(&self, prompt: &str, image_url: &str) -> Result<(), PersistenceError> {
        debug!("Saving image {} to persistence service", image_url);

        let response = self
            .client
            .post(format!("{}/save", self.base_url))
            .json(&SaveRequest { prompt, image_url })
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Persistence save returned {}", response.status());
            return Err(PersistenceError::Save(response.status()));
        }

        Ok(())
    }

    /// Fetch the history list, in the order the service returns it
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let response = self
            .client
            .get(format!("{}/history", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PersistenceError::History(response.status()));
        }

        Ok(response.json().await?)
    }
}
