//! # Mud Agent CLI (`mud`)
//!
//! ## Usage
//!
//! ```bash
//! mud --config ./config/mud.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mud chat` | Ingest if the store is empty, then answer questions interactively |
//! | `mud ingest` | Embed the corpus into the store if it is empty |
//! | `mud ingest --rebuild` | Clear the store and embed the corpus again |
//! | `mud search "<query>"` | Print the top matching documents |
//! | `mud stats` | Summarise the corpus and store |
//!
//! `ANTHROPIC_API_KEY` and `ANTHROPIC_SEARCH_MODEL` must be set (directly or
//! in a `.env` file) for `chat` and `search --refine`. Logging goes to stderr
//! and is controlled with `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mud_agent::config::{self, Credentials};
use mud_agent::{chat, ingest, search, stats};

/// Retrieval-augmented question answering over a local documentation corpus.
#[derive(Parser)]
#[command(name = "mud", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mud.toml`. A missing file means built-in defaults:
    /// corpus under `./data/mud-blazor`, local embeddings.
    #[arg(long, global = true, default_value = "./config/mud.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer questions interactively.
    ///
    /// Fills the vector store first if it is empty. Type `exit` to quit.
    Chat,

    /// Embed the corpus into the vector store.
    ///
    /// Does nothing if the store already holds entries.
    Ingest {
        /// Clear the store before ingesting.
        #[arg(long)]
        rebuild: bool,
    },

    /// Search the vector store.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Let the completion model refine the query before answering.
        #[arg(long)]
        refine: bool,
    },

    /// Show corpus and store statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chat => {
            let credentials = Credentials::from_env()?;
            chat::run_chat(&cfg, &credentials).await?;
        }
        Commands::Ingest { rebuild } => {
            ingest::run_ingest(&cfg, rebuild).await?;
        }
        Commands::Search {
            query,
            limit,
            refine,
        } => {
            let credentials = if refine {
                Some(Credentials::from_env()?)
            } else {
                None
            };
            search::run_search(&cfg, &query, limit, credentials.as_ref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}
