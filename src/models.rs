//! Data models for notebook documents and extraction results
//!
//! A document only has to be a JSON object to load. Each cell is narrowed on
//! its own: a cell, attachment map, output list or `data` bundle with an
//! unexpected shape simply has nothing to extract, and the rest of the
//! notebook is still scanned. Image payloads stay as raw JSON values whose
//! shape is checked per item, so one bad payload only fails itself.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::error::ExtractError;

/// MIME type to payload mapping, in document order.
pub type MimeBundle = Map<String, Value>;

/// A notebook document: an ordered sequence of cells.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notebook {
    /// Cells in document order
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellKind {
    /// Markdown text, may carry attachments
    Markdown,
    /// Code, may carry outputs
    Code,
    /// Any other or missing cell type (`raw`, ...)
    #[default]
    Other,
}

/// A single notebook cell.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Value")]
pub struct Cell {
    /// Cell type
    pub cell_type: CellKind,
    /// Markdown attachments: attachment name to MIME bundle
    pub attachments: Option<Map<String, Value>>,
    /// Code cell outputs, in order
    pub outputs: Vec<CodeOutput>,
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        let cell_type = match fields.get("cell_type").and_then(Value::as_str) {
            Some("markdown") => CellKind::Markdown,
            Some("code") => CellKind::Code,
            _ => CellKind::Other,
        };
        let attachments = match fields.remove("attachments") {
            Some(Value::Object(attachments)) => Some(attachments),
            _ => None,
        };
        let outputs = match fields.remove("outputs") {
            Some(Value::Array(outputs)) => outputs.into_iter().map(CodeOutput::from).collect(),
            _ => Vec::new(),
        };
        Self {
            cell_type,
            attachments,
            outputs,
        }
    }
}

/// One output record of a code cell.
#[derive(Debug, Clone, Default)]
pub struct CodeOutput {
    /// Rich display data keyed by MIME type
    pub data: Option<MimeBundle>,
}

impl From<Value> for CodeOutput {
    fn from(value: Value) -> Self {
        let data = match value {
            Value::Object(mut fields) => match fields.remove("data") {
                Some(Value::Object(data)) => Some(data),
                _ => None,
            },
            _ => None,
        };
        Self { data }
    }
}

/// Where an extracted image came from inside its notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Markdown cell attachment
    Attachment {
        /// Zero-based cell index
        cell_index: usize,
        /// Attachment name as written in the notebook
        name: String,
        /// MIME type of the payload
        mime_type: String,
    },
    /// Code cell output
    Output {
        /// Zero-based cell index
        cell_index: usize,
        /// Zero-based output index within the cell
        output_index: usize,
        /// MIME type of the payload
        mime_type: String,
    },
}

impl ImageSource {
    /// MIME type the image was stored under.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Attachment { mime_type, .. } | Self::Output { mime_type, .. } => mime_type,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attachment { cell_index, name, mime_type } => {
                write!(f, "markdown attachment {name} ({mime_type}) in cell {cell_index}")
            },
            Self::Output { cell_index, output_index, mime_type } => {
                write!(f, "cell {cell_index}, output {output_index} ({mime_type})")
            },
        }
    }
}

/// Outcome of extracting one image.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Image decoded and written
    Saved {
        /// Output file name (no directory)
        file_name: String,
        /// Number of bytes written
        bytes: usize,
    },
    /// Image could not be decoded or written
    Failed(ExtractError),
}

/// One image-bearing entry found in a notebook.
#[derive(Debug)]
pub struct ExtractedItem {
    /// Location of the payload
    pub source: ImageSource,
    /// What happened to it
    pub outcome: ItemOutcome,
}

/// Whether a notebook could be scanned at all.
#[derive(Debug)]
pub enum NotebookStatus {
    /// Cells were scanned
    Processed,
    /// Notebook skipped: missing, unreadable or not a notebook
    Skipped(ExtractError),
}

/// Per-notebook summary.
#[derive(Debug)]
pub struct NotebookReport {
    /// Notebook file name as configured
    pub notebook: String,
    /// Full path that was opened
    pub path: PathBuf,
    /// Scan status
    pub status: NotebookStatus,
    /// Image entries in discovery order
    pub items: Vec<ExtractedItem>,
}

impl NotebookReport {
    /// Number of images written.
    #[must_use]
    pub fn saved(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Saved { .. }))
            .count()
    }

    /// Number of image entries that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.items.len() - self.saved()
    }

    /// Names of the files written, in discovery order.
    #[must_use]
    pub fn saved_files(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Saved { file_name, .. } => Some(file_name.as_str()),
                ItemOutcome::Failed(_) => None,
            })
            .collect()
    }
}

/// Result of a whole extraction run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One report per configured notebook, in configured order
    pub notebooks: Vec<NotebookReport>,
}

impl RunReport {
    /// Images written across all notebooks.
    #[must_use]
    pub fn total_saved(&self) -> usize {
        self.notebooks.iter().map(NotebookReport::saved).sum()
    }

    /// Failed image entries across all notebooks.
    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.notebooks.iter().map(NotebookReport::failed).sum()
    }

    /// Notebooks that were skipped entirely.
    #[must_use]
    pub fn skipped_notebooks(&self) -> usize {
        self.notebooks
            .iter()
            .filter(|report| matches!(report.status, NotebookStatus::Skipped(_)))
            .count()
    }
}
