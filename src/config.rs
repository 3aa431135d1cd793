//! Layered configuration for both jobs.
//!
//! Built-in defaults are overlaid by `config/default`, `config/local`, an
//! optional file named on the command line and `INSIGHT_PREP__*` environment
//! variables, in that order. Relative paths resolve against the working
//! directory.

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Notebooks scanned by the visual extractor, in processing order.
pub const DEFAULT_NOTEBOOKS: [&str; 5] = [
    "01_data_overview_and_eda.ipynb",
    "02_sql_user_segmentation.ipynb",
    "03_sql_retention_analysis.ipynb",
    "04_product_insights_and_visuals.ipynb",
    "05_final_summary_dashboard.ipynb",
];

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Visual extractor settings
    pub extractor: ExtractorConfig,
    /// Data preprocessor settings
    pub preprocess: PreprocessConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Where notebooks are read from and images written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Directory holding the notebooks
    pub notebook_dir: PathBuf,
    /// Flat directory receiving extracted images
    pub output_dir: PathBuf,
    /// Notebook file names, processed in order
    pub notebooks: Vec<String>,
}

/// Input and output directories of the preprocessing job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreprocessConfig {
    /// Directory holding `orders.csv`, `order_products__prior.csv`, `products.csv`
    pub raw_dir: PathBuf,
    /// Directory receiving the derived tables
    pub processed_dir: PathBuf,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level, overridden by `RUST_LOG` when set
    pub level: String,
    /// Daily-rolling JSON log file, in addition to stderr
    pub file_path: Option<String>,
    /// Console format: "json" or "text"
    pub format: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            notebook_dir: PathBuf::from("notebooks"),
            output_dir: PathBuf::from("all_visuals"),
            notebooks: DEFAULT_NOTEBOOKS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ExtractorConfig {
    /// Config rooted at `project_root`, keeping the default notebook list.
    pub fn rooted_at(project_root: &Path) -> Self {
        Self {
            notebook_dir: project_root.join("notebooks"),
            output_dir: project_root.join("all_visuals"),
            ..Self::default()
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
        }
    }
}

impl PreprocessConfig {
    /// Config whose `data/raw` and `data/processed` live under `project_root`.
    pub fn rooted_at(project_root: &Path) -> Self {
        Self {
            raw_dir: project_root.join("data").join("raw"),
            processed_dir: project_root.join("data").join("processed"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`AppConfig::load`], with an optional extra file layered
    /// above `config/local`.
    pub fn load_with(extra_file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("INSIGHT_PREP").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        if self.extractor.notebooks.is_empty() {
            return Err(anyhow::anyhow!("extractor.notebooks must list at least one notebook"));
        }

        let dirs = [
            ("extractor.notebook_dir", &self.extractor.notebook_dir),
            ("extractor.output_dir", &self.extractor.output_dir),
            ("preprocess.raw_dir", &self.preprocess.raw_dir),
            ("preprocess.processed_dir", &self.preprocess.processed_dir),
        ];
        for (key, dir) in dirs {
            if dir.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("{} cannot be empty", key));
            }
        }

        Ok(())
    }
}
