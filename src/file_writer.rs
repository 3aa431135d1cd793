//! File writing utilities.
//!
//! Decoded notebook images go to a flat directory as raw bytes; derived
//! tables are written as CSV with a header row.

use csv::{StringRecord, Writer};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, PipelineError, Result};
use crate::table::Table;

/// Create `dir` and its parents; a no-op when it already exists.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    create_dir_all(dir)
}

/// Write decoded image bytes to `output_dir/file_name`, replacing any existing file.
///
/// # Returns
///
/// Path of the written file
pub fn write_image(output_dir: &Path, file_name: &str, bytes: &[u8]) -> std::result::Result<PathBuf, ExtractError> {
    let path = output_dir.join(file_name);
    let write = || -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(bytes)?;
        writer.flush()
    };
    write().map_err(|source| ExtractError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// CSV output written row by row: header first, then data rows.
pub struct CsvTableWriter {
    path: PathBuf,
    writer: Writer<BufWriter<File>>,
    rows: usize,
}

impl CsvTableWriter {
    /// Create (or truncate) `file_path` and write the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header written.
    pub fn create(file_path: &Path, headers: &[String]) -> Result<Self> {
        let file = File::create(file_path).map_err(|e| PipelineError::io(file_path, e))?;
        let mut writer = Writer::from_writer(BufWriter::new(file));
        writer.write_record(headers)?;
        Ok(Self {
            path: file_path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    /// Append one data row.
    pub fn write_row(&mut self, row: &StringRecord) -> Result<()> {
        self.writer.write_record(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush everything to disk and return the number of data rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().map_err(|e| PipelineError::io(&self.path, e))?;
        Ok(self.rows)
    }
}

/// Write a table to a CSV file: header row, then data rows.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn write_table(table: &Table, file_path: &Path) -> Result<()> {
    let mut writer = CsvTableWriter::create(file_path, &table.headers)?;
    for row in &table.rows {
        writer.write_row(row)?;
    }
    writer.finish()?;
    Ok(())
}
