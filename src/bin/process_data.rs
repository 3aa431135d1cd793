//! Clean and join the raw order CSVs and compute per-user metrics.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use insight_prep::logging::init_from_config;
use insight_prep::{AppConfig, Preprocessor};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file, layered above config/local
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_with(cli.config.as_deref())?;

    // Initialize logging; the guard must outlive the run
    let _guard = init_from_config(&config.logging, cli.log_level.as_deref())?;

    info!(
        "Preprocessing {} into {}",
        config.preprocess.raw_dir.display(),
        config.preprocess.processed_dir.display()
    );

    Preprocessor::new(config.preprocess)
        .run()
        .context("Data preprocessing failed")?;

    Ok(())
}
