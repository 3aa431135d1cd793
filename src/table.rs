//! In-memory CSV tables and the relational operations the preprocessor needs.
//!
//! Rows are kept as [`StringRecord`]s holding the text found in the file, so
//! pass-through columns are written back unchanged. Numeric interpretation
//! happens per column, on demand, through [`Table::numbers`] and
//! [`Table::integers`]. Joins go through a [`JoinIndex`], which lets callers
//! stream joined rows to a writer instead of materialising them.

use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Cell texts read as a missing value.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a cell holds a missing value.
#[must_use]
pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

/// A named table: header row plus data records of the same width.
#[derive(Debug, Clone)]
pub struct Table {
    /// Name used in error messages
    pub name: String,
    /// Column names
    pub headers: Vec<String>,
    /// Data rows
    pub rows: Vec<StringRecord>,
}

impl Table {
    /// Empty table with the given columns.
    pub fn new(name: &str, headers: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Read a comma-delimited file with a header row.
    pub fn read_csv(name: &str, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_reader(name, BufReader::new(file))
    }

    /// Read CSV text with a header row from any reader.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();

        let mut table = Self::new(name, headers);
        for record in rdr.records() {
            let mut record = record?;
            // positions are only useful while reading
            record.set_position(None);
            table.rows.push(record);
        }
        table.rows.shrink_to_fit();
        Ok(table)
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column` in the header.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        column_position(&self.name, &self.headers, column)
    }

    /// Cell texts of one column, top to bottom.
    pub fn column(&self, column: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| cell(row, idx)).collect())
    }

    /// A column parsed as floats; missing cells are `None`.
    pub fn numbers(&self, column: &str) -> Result<Vec<Option<f64>>> {
        self.column(column)?
            .into_iter()
            .enumerate()
            .map(|(row, text)| {
                if is_missing(text) {
                    return Ok(None);
                }
                text.trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| self.invalid_number(column, row, text))
            })
            .collect()
    }

    /// A column parsed as integers; `7` and `7.0` both read as 7.
    #[allow(clippy::cast_possible_truncation)]
    pub fn integers(&self, column: &str) -> Result<Vec<Option<i64>>> {
        self.column(column)?
            .into_iter()
            .enumerate()
            .map(|(row, text)| {
                if is_missing(text) {
                    return Ok(None);
                }
                let trimmed = text.trim();
                if let Ok(value) = trimmed.parse::<i64>() {
                    return Ok(Some(value));
                }
                match trimmed.parse::<f64>() {
                    Ok(value) if value.fract() == 0.0 && value.abs() < 9.0e15 => Ok(Some(value as i64)),
                    _ => Err(self.invalid_number(column, row, text)),
                }
            })
            .collect()
    }

    /// Rows with missing cells of `column` replaced by `value`, produced one at a time.
    pub fn filled_rows<'a>(
        &'a self,
        column: &str,
        value: &'a str,
    ) -> Result<impl Iterator<Item = StringRecord> + 'a> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(move |row| {
            row.iter()
                .enumerate()
                .map(|(i, text)| if i == idx && is_missing(text) { value } else { text })
                .collect()
        }))
    }

    /// Left join on `key`: every row of `self` is kept, in order.
    ///
    /// Rows without a match get empty cells for the right-hand columns; a key
    /// matching several right rows yields one row per match.
    pub fn left_join(&self, right: &Self, key: &str) -> Result<Self> {
        let index = JoinIndex::new(&self.name, &self.headers, right, key)?;
        let mut joined = Self::new(&self.name, index.headers().to_vec());
        for row in &self.rows {
            for matched in index.left_matches(row) {
                joined.rows.push(index.combine(row, matched));
            }
        }
        Ok(joined)
    }

    /// Row count per distinct non-missing value of `key`, in first-seen order.
    ///
    /// The result has two columns: `key` and `size_column`.
    pub fn group_size(&self, key: &str, size_column: &str) -> Result<Self> {
        let idx = self.column_index(key)?;
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in &self.rows {
            let value = cell(row, idx).trim();
            if is_missing(value) {
                continue;
            }
            let count = counts.entry(value).or_insert_with(|| {
                order.push(value);
                0
            });
            *count += 1;
        }

        let mut sizes = Self::new(&self.name, vec![key.to_string(), size_column.to_string()]);
        sizes.rows = order
            .into_iter()
            .map(|value| StringRecord::from(vec![value.to_string(), counts[value].to_string()]))
            .collect();
        Ok(sizes)
    }

    fn invalid_number(&self, column: &str, row: usize, text: &str) -> PipelineError {
        PipelineError::InvalidNumber {
            table: self.name.clone(),
            column: column.to_string(),
            row,
            value: text.to_string(),
        }
    }
}

/// Lookup of a right-hand table by join key, built once and probed per left row.
///
/// Keys compare as trimmed text and missing keys never match. Right-hand
/// columns sharing a name with a non-key left column get `_y`, the left
/// ones `_x`.
#[derive(Debug)]
pub struct JoinIndex<'a> {
    right: &'a Table,
    left_key: usize,
    right_columns: Vec<usize>,
    headers: Vec<String>,
    index: HashMap<&'a str, Vec<usize>>,
}

impl<'a> JoinIndex<'a> {
    /// Index `right` on `key` for joining rows laid out as `left_headers`.
    pub fn new(left_name: &str, left_headers: &[String], right: &'a Table, key: &str) -> Result<Self> {
        let left_key = column_position(left_name, left_headers, key)?;
        let right_key = right.column_index(key)?;
        let right_columns: Vec<usize> = (0..right.headers.len()).filter(|&i| i != right_key).collect();

        let shared = |name: &str| {
            left_headers.iter().enumerate().any(|(i, h)| i != left_key && h == name)
                && right_columns.iter().any(|&j| right.headers[j] == name)
        };

        let mut headers: Vec<String> = left_headers
            .iter()
            .map(|h| if shared(h.as_str()) { format!("{h}_x") } else { h.clone() })
            .collect();
        headers.extend(right_columns.iter().map(|&j| {
            let h = &right.headers[j];
            if shared(h.as_str()) {
                format!("{h}_y")
            } else {
                h.clone()
            }
        }));

        let mut index: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (r, row) in right.rows.iter().enumerate() {
            let value = cell(row, right_key).trim();
            if !is_missing(value) {
                index.entry(value).or_default().push(r);
            }
        }

        Ok(Self {
            right,
            left_key,
            right_columns,
            headers,
            index,
        })
    }

    /// Header of the joined rows.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Right rows matching `left`, in right-table order.
    pub fn matches(&self, left: &StringRecord) -> impl Iterator<Item = &'a StringRecord> + '_ {
        let right = self.right;
        let value = cell(left, self.left_key).trim();
        let found = if is_missing(value) { None } else { self.index.get(value) };
        found
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .map(move |&r| &right.rows[r])
    }

    /// Like [`JoinIndex::matches`], but a row without matches yields a single `None`.
    pub fn left_matches(&self, left: &StringRecord) -> impl Iterator<Item = Option<&'a StringRecord>> + '_ {
        let mut matches = self.matches(left).peekable();
        let unmatched = matches.peek().is_none().then_some(None);
        matches.map(Some).chain(unmatched)
    }

    /// Append the right-hand cells of `matched` to `out`; empty cells when `None`.
    pub fn extend_row(&self, out: &mut StringRecord, matched: Option<&StringRecord>) {
        for &j in &self.right_columns {
            out.push_field(matched.map_or("", |row| cell(row, j)));
        }
    }

    /// A new joined row from `left` and the right-hand row it matched.
    #[must_use]
    pub fn combine(&self, left: &StringRecord, matched: Option<&StringRecord>) -> StringRecord {
        let mut out = left.clone();
        self.extend_row(&mut out, matched);
        out
    }
}

fn column_position(table: &str, headers: &[String], column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

fn cell(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("")
}
