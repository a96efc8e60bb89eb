//! # recme CLI
//!
//! Entry point for the recme server and its maintenance commands.
//!
//! ## Usage
//!
//! ```bash
//! recme --config ./config/recme.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recme init` | Create the SQLite database and run schema migrations |
//! | `recme ingest <file>` | Index a plain-text reference file into the vector store |
//! | `recme serve` | Run the realtime chat server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! recme init --config ./config/recme.toml
//!
//! # Feed reference material into the vector index
//! recme ingest ./notes/food-preferences.txt --config ./config/recme.toml
//!
//! # Start the server
//! recme serve --config ./config/recme.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use recme::config::load_config;
use recme::embedding::{Embedder, OpenAiEmbedder};
use recme::index::VectorIndex;
use recme::{db, ingest, migrate, server};

/// recme — a realtime group-chat server with an LLM-driven
/// recommendation pipeline.
#[derive(Parser)]
#[command(
    name = "recme",
    about = "Realtime group-chat server with an LLM-driven recommendation pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recme.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Index a plain-text reference file into the vector store.
    ///
    /// The file is split on blank lines; each paragraph is embedded and
    /// added to the shared index, tagged with the file name.
    Ingest {
        /// Plain-text file to index.
        file: PathBuf,
    },

    /// Run the realtime chat server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recme=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Ingest { file } => {
            let index = Arc::new(VectorIndex::load(&config.index.path)?);
            let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
            let count = ingest::ingest_file(index, embedder, &file).await?;
            println!("Indexed {} chunks from {}", count, file.display());
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
