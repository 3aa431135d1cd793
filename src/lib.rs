//! Insight Prep - notebook visuals and order-data preprocessing
//!
//! Two independent batch jobs supporting the grocery insights notebooks.
//!
//! # Features
//!
//! - Extract images embedded in notebooks (markdown attachments and code
//!   cell outputs) into one flat directory
//! - Clean and join the raw order CSVs
//! - Compute per-user frequency, recency and basket-size metrics

/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Notebook image extraction
pub mod extractor;
/// Image and CSV writers
pub mod file_writer;
/// Logging setup and utilities
pub mod logging;
/// Notebook records and extraction reports
pub mod models;
/// Order-data preprocessing job
pub mod preprocess;
/// Per-user RFM metrics
pub mod rfm;
/// CSV tables with joins and grouping
pub mod table;
/// Naming and payload helpers
pub mod utils;

// Re-export key components for easier access
pub use config::{AppConfig, ExtractorConfig, PreprocessConfig};
pub use extractor::VisualExtractor;
pub use models::{Notebook, RunReport};
pub use preprocess::{PreprocessSummary, Preprocessor};
pub use table::Table;
