use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wp_post_fetcher::config;
use wp_post_fetcher::sync::{self, SyncOutcome};

/// Load WordPress posts into a local SQLite database
#[derive(Parser, Debug)]
#[command(name = "wp_post_fetcher", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = config::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;

    match sync::run(&settings).await.context("Sync failed")? {
        SyncOutcome::NothingToDo => println!("No posts matched the date filter"),
        SyncOutcome::Stored { count, path } => {
            println!("Stored {} posts in {}", count, path.display())
        }
    }

    Ok(())
}
