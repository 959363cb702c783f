mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "goalcast")]
#[command(about = "Football match ratings, form features and market predictions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Download (or read from disk) match results into the database
    Fetch {
        /// Read CSV files from this directory instead of downloading
        #[arg(long)]
        source_dir: Option<PathBuf>,
        /// Read CSV files from DATA_DIR
        #[arg(long, conflicts_with = "source_dir")]
        local: bool,
    },
    /// Train one classifier per market
    Train {
        /// Refresh match data before training
        #[arg(long)]
        fetch: bool,
    },
    /// Predict every market for a fixture
    Predict { home: String, away: String },
    /// Query a team's rating and recent matches
    Team {
        name: String,
        #[arg(short, long, default_value = "10")]
        last: usize,
    },
    /// Show the rating table
    Ratings {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting goalcast API server on port {}", port);
            api::serve(&config, port).await?;
        }
        Some(Commands::Fetch { source_dir, local }) => {
            let source_dir = source_dir.or_else(|| local.then(|| config.data_dir.clone()));
            cli::fetch_data(&config, source_dir.as_deref()).await?;
        }
        Some(Commands::Train { fetch }) => {
            tracing::info!("Training market models...");
            cli::train(&config, fetch).await?;
        }
        Some(Commands::Predict { home, away }) => {
            cli::predict(&config, &home, &away).await?;
        }
        Some(Commands::Team { name, last }) => {
            cli::query_team(&config, &name, last).await?;
        }
        Some(Commands::Ratings { limit }) => {
            cli::show_ratings(&config, limit).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            cli::init_db(&config).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting goalcast API server on port 3000");
            api::serve(&config, 3000).await?;
        }
    }

    Ok(())
}
