//! comic - terminal client for a comicd server
//!
//! Generates a comic and redraws the board as panels and images arrive
//! (with the stored history count underneath), or prints the stored history.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comicd::client::{view, ApiClient, Board, Outcome};
use comicd::persistence::PersistenceClient;
use comicd::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AI comic creator client
#[derive(Parser, Debug)]
#[command(name = "comic", version, about = "Create comics with a comicd server")]
struct Args {
    /// comicd server URL (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// TOML config file (defaults to ./comicd.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a three panel comic from a story idea; also loads the
    /// history count shown under the panels
    Generate {
        /// Story idea, e.g. "a bunny visits the moon"
        prompt: Vec<String>,
    },
    /// Show previously generated images
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the rendered board stays readable on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comicd=info,comic=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.client.server_url = server;
    }

    let api = ApiClient::new(&config.client)?;
    let persistence = PersistenceClient::new(&config.persistence)?;
    let board = Board::new(api, persistence, config.client.image_hosts.clone());

    match args.command {
        Command::History => {
            board.load_history().await;
            print!("{}", view::render_history(&board.snapshot().history));
        }
        Command::Generate { prompt } => {
            let prompt = prompt.join(" ");
            let mut updates = board.subscribe();

            // the page loads history on mount, alongside the first generation
            let generation = async {
                let (result, ()) = tokio::join!(board.generate(&prompt), board.load_history());
                result
            };
            tokio::pin!(generation);

            let result = loop {
                tokio::select! {
                    result = &mut generation => break result,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            continue;
                        }
                        print!("{}", view::render_comic(&updates.borrow_and_update()));
                    }
                }
            };

            print!("{}", view::render_comic(&board.snapshot()));

            match result? {
                Outcome::Completed { images } => {
                    tracing::info!("Comic ready with {} images", images);
                }
                Outcome::Superseded => {}
            }
        }
    }

    Ok(())
}
