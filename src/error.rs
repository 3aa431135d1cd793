//! Error types for the insight-prep library.
//!
//! The visual extractor never aborts a run, so its [`ExtractError`] values end
//! up inside the run report. The preprocessor fails fast and surfaces
//! [`PipelineError`] to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while extracting images from one notebook.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Notebook file does not exist
    #[error("Notebook file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Notebook file exists but could not be read
    #[error("Error reading {}: {source}", .path.display())]
    Read {
        /// Notebook path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Notebook content is not a valid notebook document
    #[error("Error decoding JSON from {}: {source}", .path.display())]
    Parse {
        /// Notebook path
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Image payload has an unexpected JSON shape
    #[error("Malformed {mime_type} payload: expected {expected}, found {found}")]
    MalformedPayload {
        /// MIME type the payload was stored under
        mime_type: String,
        /// Accepted shape
        expected: &'static str,
        /// Short preview of what was found
        found: String,
    },

    /// Payload is not valid base64
    #[error("Invalid base64 data: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Decoded image could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Errors that abort a preprocessing run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File I/O errors, with the path involved
    #[error("File I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being read, written, or created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// CSV parse or write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A table lacks a column the pipeline needs
    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn {
        /// Table name
        table: String,
        /// Missing column
        column: String,
    },

    /// A non-empty cell could not be parsed as a number
    #[error("Table '{table}', column '{column}', row {row}: '{value}' is not a number")]
    InvalidNumber {
        /// Table name
        table: String,
        /// Column name
        column: String,
        /// Zero-based data row
        row: usize,
        /// Offending cell text
        value: String,
    },
}

/// Convenience type alias for Result with PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
