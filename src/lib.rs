//! comicd - AI comic creator
//!
//! A story model expands an idea into captioned panel prompts, an image model
//! renders each panel, and a remote persistence service keeps the history.

pub mod api;
pub mod client;
pub mod config;
pub mod images;
pub mod persistence;
pub mod providers;
pub mod story;

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use api::AppState;
pub use config::Config;

/// The comicd server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let state = AppState::from_config(&config)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if !state.chat.is_configured() {
            warn!("Story model credentials not configured; story generation will fail");
        }
        if !state.images.is_configured() {
            warn!("Image model credentials not configured; image generation will fail");
        }

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("comicd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("comicd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
