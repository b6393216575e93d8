//! Image generation via a Replicate-style predictions API
//!
//! A prediction is created with `Prefer: wait` so fast models answer in the
//! same request; anything still running is polled through its `urls.get`
//! link until it reaches a terminal status.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::UpstreamError;
use crate::config::ImageConfig;

/// Model reference: `owner/name` or `owner/name:version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for ModelRef {
    type Err = UpstreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, version) = match s.split_once(':') {
            Some((path, version)) => (path, Some(version.to_string())),
            None => (s, None),
        };

        let (owner, name) = path
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| UpstreamError::Malformed(format!("invalid model reference: {}", s)))?;

        if version.as_deref() == Some("") {
            return Err(UpstreamError::Malformed(format!(
                "invalid model reference: {}",
                s
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

/// Prediction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PredictionStatus::Starting | PredictionStatus::Processing)
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Prediction as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub urls: PredictionUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
}

/// Prediction input for the comic image model
#[derive(Debug, Serialize)]
struct ImageInput<'a> {
    prompt: &'a str,
    num_inference_steps: u32,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: ImageInput<'a>,
}

/// Coerce a prediction output to a string the way `String(output)` would
///
/// Arrays join their coerced items with `,`; `null` means no output.
pub fn output_to_string(output: &Value) -> Option<String> {
    fn coerce(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(coerce).collect::<Vec<_>>().join(","),
            other => other.to_string(),
        }
    }

    match output {
        Value::Null => None,
        value => Some(coerce(value)).filter(|s| !s.is_empty()),
    }
}

/// Image-generation client
#[derive(Debug, Clone)]
pub struct ImageClient {
    client: Client,
    api_token: Option<String>,
    base_url: String,
    model: ModelRef,
    num_inference_steps: u32,
    variant: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ImageClient {
    /// Create a client from the image provider config
    pub fn new(config: &ImageConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.max_wait()).build()?;

        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.parse()?,
            num_inference_steps: config.num_inference_steps,
            variant: config.variant.clone(),
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        })
    }

    /// Check if an API token is configured
    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    /// Run the image model on a prompt and return the output URL
    pub async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let api_token = self
            .api_token
            .as_ref()
            .ok_or(UpstreamError::NotConfigured("image model"))?;

        let request = PredictionRequest {
            version: self.model.version.as_deref(),
            input: ImageInput {
                prompt,
                num_inference_steps: self.num_inference_steps,
                model: &self.variant,
            },
        };

        let url = match self.model.version {
            Some(_) => format!("{}/predictions", self.base_url),
            None => format!(
                "{}/models/{}/{}/predictions",
                self.base_url, self.model.owner, self.model.name
            ),
        };

        debug!("Creating prediction for {}/{}", self.model.owner, self.model.name);

        let response = self
            .client
            .post(url)
            .bearer_auth(api_token)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        let prediction = Self::read_prediction(response).await?;
        let prediction = self.wait_for(prediction, api_token).await?;

        match prediction.status {
            PredictionStatus::Succeeded => output_to_string(&prediction.output).ok_or_else(|| {
                UpstreamError::Malformed(format!("prediction {} has no output", prediction.id))
            }),
            status => Err(UpstreamError::PredictionFailed {
                id: prediction.id,
                status,
                message: output_to_string(&prediction.error).unwrap_or_default(),
            }),
        }
    }

    /// Poll a prediction until it reaches a terminal status
    async fn wait_for(
        &self,
        mut prediction: Prediction,
        api_token: &str,
    ) -> Result<Prediction, UpstreamError> {
        let deadline = Instant::now() + self.max_wait;

        while !prediction.status.is_terminal() {
            let Some(get_url) = prediction.urls.get.clone() else {
                return Err(UpstreamError::Malformed(format!(
                    "prediction {} is {} but has no poll URL",
                    prediction.id, prediction.status
                )));
            };

            if Instant::now() + self.poll_interval > deadline {
                return Err(UpstreamError::Timeout(prediction.id));
            }
            tokio::time::sleep(self.poll_interval).await;

            debug!("Polling prediction {} ({})", prediction.id, prediction.status);
            let response = self.client.get(get_url).bearer_auth(api_token).send().await?;
            prediction = Self::read_prediction(response).await?;
        }

        Ok(prediction)
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, UpstreamError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Image API error: {} - {}", status, body);
            return Err(UpstreamError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}
