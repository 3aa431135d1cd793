//! Extract images embedded in the project notebooks into `all_visuals/`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use insight_prep::logging::init_from_config;
use insight_prep::{AppConfig, VisualExtractor};

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
        "Extracting visuals from {} into {}",
        config.extractor.notebook_dir.display(),
        config.extractor.output_dir.display()
    );

    let report = VisualExtractor::new(config.extractor).run();

    info!(
        saved = report.total_saved(),
        failed = report.total_failed(),
        skipped_notebooks = report.skipped_notebooks(),
        "Visual extraction process complete."
    );
    Ok(())
}
