//! Comic board state and the generation flow
//!
//! The board lives in a `watch` channel: every change is one
//! `send_if_modified` call, so views can subscribe and redraw on each
//! update. Each generation gets an id; writes carrying a stale id are
//! dropped, so a superseded generation can never touch the panels of the
//! one that replaced it.

use reqwest::Url;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{ApiClient, ClientError};
use crate::persistence::{HistoryEntry, PersistenceClient};
use crate::story::Panel;

/// Everything a view needs to draw the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    /// Id of the most recently started generation
    pub generation: u64,
    pub loading: bool,
    /// Error banner
    pub error: Option<String>,
    pub panels: Vec<Panel>,
    pub history: Vec<HistoryEntry>,
}

/// How a generation ended when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All panels were attempted; `images` of them got an image
    Completed { images: usize },
    /// A newer generation started; remaining results were discarded
    Superseded,
}

/// Client-side comic board
pub struct Board {
    api: ApiClient,
    persistence: PersistenceClient,
    image_hosts: Vec<String>,
    state: watch::Sender<BoardState>,
}

impl Board {
    /// Create a board; an empty `image_hosts` list accepts any host
    pub fn new(api: ApiClient, persistence: PersistenceClient, image_hosts: Vec<String>) -> Self {
        let (state, _) = watch::channel(BoardState::default());
        Self {
            api,
            persistence,
            image_hosts,
            state,
        }
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Fetch the history list; failures are logged only
    pub async fn load_history(&self) {
        match self.persistence.history().await {
            Ok(history) => {
                debug!("Loaded {} history entries", history.len());
                self.state.send_modify(|state| state.history = history);
            }
            Err(e) => error!("Error fetching history: {}", e),
        }
    }

    /// Generate a comic for `prompt`
    ///
    /// Panels appear as soon as the story returns; images are requested one
    /// panel at a time and merged into their slot as each one resolves. A
    /// failed image leaves its panel without one. A story failure sets the
    /// error banner and is returned.
    pub async fn generate(&self, prompt: &str) -> Result<Outcome, ClientError> {
        if prompt.trim().is_empty() {
            return Err(ClientError::EmptyPrompt);
        }

        let generation = self.begin();
        debug!("Starting generation {}", generation);

        let script = match self.api.generate_story(prompt).await {
            Ok(script) => script,
            Err(e) => {
                error!("Error generating story: {}", e);
                let message = e.to_string();
                let current = self.update(generation, |state| {
                    state.error = Some(message);
                    state.loading = false;
                });
                if !current {
                    return Ok(Outcome::Superseded);
                }
                return Err(e);
            }
        };

        let prompts: Vec<String> = script.comics.iter().map(|p| p.prompt.clone()).collect();
        if !self.update(generation, |state| state.panels = script.comics) {
            return Ok(Outcome::Superseded);
        }

        let mut images = 0;
        for (index, panel_prompt) in prompts.iter().enumerate() {
            if !self.is_current(generation) {
                return Ok(Outcome::Superseded);
            }

            let image_url = match self.api.generate_image(panel_prompt).await {
                Ok(url) => self.check_host(url),
                Err(e) => Err(e),
            };

            match image_url {
                Ok(url) => {
                    let stored = self.update(generation, |state| {
                        if let Some(panel) = state.panels.get_mut(index) {
                            panel.image_url = Some(url);
                        }
                    });
                    if !stored {
                        return Ok(Outcome::Superseded);
                    }
                    images += 1;
                }
                Err(e) => error!("Error generating image for panel {}: {}", index, e),
            }
        }

        if !self.update(generation, |state| state.loading = false) {
            return Ok(Outcome::Superseded);
        }

        info!(
            "Generation {} finished with {}/{} images",
            generation,
            images,
            prompts.len()
        );
        Ok(Outcome::Completed { images })
    }

    /// Start a new generation: clear panels and banner, set loading
    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.loading = true;
            state.error = None;
            state.panels.clear();
            generation = state.generation;
        });
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }

    /// Apply `change` only if `generation` is still the current one
    fn update(&self, generation: u64, change: impl FnOnce(&mut BoardState)) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            change(state);
            true
        })
    }

    fn check_host(&self, url: String) -> Result<String, ClientError> {
        if self.image_hosts.is_empty() {
            return Ok(url);
        }

        let allowed = Url::parse(&url).ok().is_some_and(|parsed| {
            parsed.host_str().is_some_and(|host| {
                self.image_hosts
                    .iter()
                    .any(|entry| host_matches(entry, parsed.scheme(), host))
            })
        });

        if allowed {
            Ok(url)
        } else {
            warn!("Image host not allowed: {}", url);
            Err(ClientError::DisallowedImageHost(url))
        }
    }
}

/// Match an allow-list entry: `host` means `https://host`, while
/// `scheme://host` names the scheme explicitly
fn host_matches(entry: &str, scheme: &str, host: &str) -> bool {
    match entry.split_once("://") {
        Some((entry_scheme, entry_host)) => {
            entry_scheme.eq_ignore_ascii_case(scheme) && entry_host.eq_ignore_ascii_case(host)
        }
        None => scheme == "https" && entry.eq_ignore_ascii_case(host),
    }
}
