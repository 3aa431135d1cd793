//! Extraction of embedded images from notebook documents.
//!
//! Every configured notebook is scanned cell by cell. Markdown attachments
//! and code cell outputs whose MIME type starts with `image/` are decoded and
//! written to one flat output directory. Failures are recorded per notebook
//! or per image and never stop the run.

use std::path::Path;
use tracing::{error, info, warn};

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::file_writer::{ensure_dir, write_image};
use crate::logging::OperationTimer;
use crate::models::{
    Cell, CellKind, ExtractedItem, ImageSource, ItemOutcome, Notebook, NotebookReport, NotebookStatus, RunReport,
};
use crate::utils::{
    attachment_file_name, attachment_payload, decode_base64, is_image_mime, notebook_stem, output_file_name,
    output_payload,
};

/// Pulls embedded images out of a fixed list of notebooks.
#[derive(Debug, Clone)]
pub struct VisualExtractor {
    config: ExtractorConfig,
}

impl VisualExtractor {
    /// Create an extractor for the given directories and notebook list.
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Process every configured notebook in order.
    pub fn run(&self) -> RunReport {
        let timer = OperationTimer::new("extract_visuals");

        if let Err(e) = ensure_dir(&self.config.output_dir) {
            error!(
                "Could not create output directory {}: {}",
                self.config.output_dir.display(),
                e
            );
        }

        let notebooks = self
            .config
            .notebooks
            .iter()
            .map(|notebook| self.process_notebook(notebook))
            .collect();

        timer.finish();
        RunReport { notebooks }
    }

    /// Extract every image of one notebook.
    pub fn process_notebook(&self, notebook: &str) -> NotebookReport {
        let path = self.config.notebook_dir.join(notebook);
        let mut report = NotebookReport {
            notebook: notebook.to_string(),
            path: path.clone(),
            status: NotebookStatus::Processed,
            items: Vec::new(),
        };

        if !path.exists() {
            warn!("Warning: Notebook file not found: {}", path.display());
            report.status = NotebookStatus::Skipped(ExtractError::MissingFile(path));
            return report;
        }

        info!("Processing {}...", notebook);

        let document = match load_notebook(&path) {
            Ok(document) => document,
            Err(e) => {
                error!("{}. Skipping.", e);
                report.status = NotebookStatus::Skipped(e);
                return report;
            },
        };

        let stem = notebook_stem(notebook);
        for (cell_index, cell) in document.cells.iter().enumerate() {
            match cell.cell_type {
                CellKind::Markdown => self.extract_attachments(&stem, cell_index, cell, &mut report),
                CellKind::Code => self.extract_outputs(&stem, cell_index, cell, &mut report),
                CellKind::Other => {},
            }
        }

        if report.saved() == 0 {
            info!("  No images found in {}.", notebook);
        }
        report
    }

    fn extract_attachments(&self, stem: &str, cell_index: usize, cell: &Cell, report: &mut NotebookReport) {
        let Some(attachments) = &cell.attachments else {
            return;
        };

        for (name, bundle) in attachments {
            let Some(bundle) = bundle.as_object() else {
                warn!(
                    "  Attachment {} in {}, cell {} is not a MIME bundle; ignoring",
                    name, report.notebook, cell_index
                );
                continue;
            };

            for (mime_type, payload) in bundle.iter().filter(|(mime, _)| is_image_mime(mime)) {
                let source = ImageSource::Attachment {
                    cell_index,
                    name: name.clone(),
                    mime_type: mime_type.clone(),
                };
                let file_name = attachment_file_name(stem, cell_index, name, mime_type);
                let outcome = attachment_payload(mime_type, payload)
                    .and_then(|encoded| self.save(&file_name, &encoded));
                record(report, source, file_name, outcome);
            }
        }
    }

    fn extract_outputs(&self, stem: &str, cell_index: usize, cell: &Cell, report: &mut NotebookReport) {
        for (output_index, output) in cell.outputs.iter().enumerate() {
            let Some(data) = &output.data else {
                continue;
            };

            for (mime_type, payload) in data.iter().filter(|(mime, _)| is_image_mime(mime)) {
                let source = ImageSource::Output {
                    cell_index,
                    output_index,
                    mime_type: mime_type.clone(),
                };
                let file_name = output_file_name(stem, cell_index, output_index, mime_type);
                let outcome = output_payload(mime_type, payload).and_then(|encoded| self.save(&file_name, &encoded));
                record(report, source, file_name, outcome);
            }
        }
    }

    fn save(&self, file_name: &str, encoded: &str) -> Result<usize, ExtractError> {
        let bytes = decode_base64(encoded)?;
        write_image(&self.config.output_dir, file_name, &bytes)?;
        Ok(bytes.len())
    }
}

fn record(report: &mut NotebookReport, source: ImageSource, file_name: String, outcome: Result<usize, ExtractError>) {
    let outcome = match outcome {
        Ok(bytes) => {
            info!("  Saved image: {}", file_name);
            ItemOutcome::Saved { file_name, bytes }
        },
        Err(e) => {
            error!("  Error processing {} in {}: {}", source, report.notebook, e);
            ItemOutcome::Failed(e)
        },
    };
    report.items.push(ExtractedItem { source, outcome });
}

/// Read and parse one notebook document.
pub fn load_notebook(path: &Path) -> Result<Notebook, ExtractError> {
    let content = std::fs::read_to_string(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ExtractError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
