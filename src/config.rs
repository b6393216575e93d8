//! Server and client configuration
//!
//! Layered with figment: built-in defaults, an optional TOML file,
//! `COMICD_*` environment variables (nested with `__`), and finally the
//! provider credential variables `GITHUB_TOKEN` / `REPLICATE_API_TOKEN`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "comicd.toml";

/// Environment prefix for config overrides
pub const ENV_PREFIX: &str = "COMICD_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub story: StoryConfig,
    pub image: ImageConfig,
    pub persistence: PersistenceConfig,
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            story: StoryConfig::default(),
            image: ImageConfig::default(),
            persistence: PersistenceConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

/// Chat-completion provider used by the story endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryConfig {
    /// OpenAI-compatible API base (no trailing slash)
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Image-generation provider used by the image endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub base_url: String,
    /// Model reference, `owner/name` or `owner/name:version`
    pub model: String,
    pub num_inference_steps: u32,
    /// Model variant passed through as the `model` input
    pub variant: String,
    pub api_token: Option<String>,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_string(),
            model: "sundai-club/snow_bunny:166808a65c69a9258c4fe45a4ffd6eeb1579257fadd3c57d388fff41ae529c6a"
                .to_string(),
            num_inference_steps: 8,
            variant: "schnell".to_string(),
            api_token: None,
            poll_interval_ms: 1000,
            max_wait_secs: 120,
        }
    }
}

impl ImageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Remote persistence service (history store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sundai-backend-176750765325.us-east4.run.app".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Terminal client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a running comicd server
    pub server_url: String,
    /// Hosts image URLs may be served from; a bare host requires https,
    /// `scheme://host` allows that scheme
    pub image_hosts: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            image_hosts: vec![
                "replicate.delivery".to_string(),
                "storage.googleapis.com".to_string(),
            ],
            timeout_secs: 180,
        }
    }
}

impl Config {
    /// Build the layered figment without extracting it
    ///
    /// A missing TOML file is not an error; figment treats it as empty.
    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["GITHUB_TOKEN"])
                    .map(|_| "story.api_key".into()),
            )
            .merge(
                Env::raw()
                    .only(&["REPLICATE_API_TOKEN"])
                    .map(|_| "image.api_token".into()),
            )
    }

    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }
}
