use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyfeed_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "storyfeed")]
#[command(author, version, about = "Turn RSS/Atom feeds into AI-enriched story posts")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Category to process, or "all" (shorthand for `run`)
    target: Option<String>,

    /// Path to the root configuration file
    #[arg(short, long, global = true, env = "STORYFEED_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one category or all of them
    Run {
        /// Category name, or "all"
        target: Option<String>,
    },
    /// List configured categories and their stored posts
    List,
    /// Show feeds recorded as failing
    Ledger,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;

    // RUST_LOG wins over the configured level
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    tracing::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Some(Commands::Run { target }) => commands::run::run(&config, target.as_deref()).await,
        None => commands::run::run(&config, cli.target.as_deref()).await,
        Some(Commands::List) => commands::list::run(&config),
        Some(Commands::Ledger) => commands::ledger::run(&config),
    }
}
