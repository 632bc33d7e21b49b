//! Record file writer
//!
//! Appends delimited rows to a per-modality record file. The label row is
//! written only when the file does not exist yet, so re-running a session
//! keeps extending the same table.

use crate::features::{FeatureRecord, FieldValue};
use crate::utils::error::PersistenceError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Field separator of record files; distinct from the decimal point
pub const DEFAULT_DELIMITER: char = ';';

const LINE_TERMINATOR: &str = "\r\n";

/// Append one value row to `path`, preceded by the label row if the file
/// does not exist yet and `labels` is non-empty.
///
/// Both rows go out in a single write. Returns whether the label row was
/// written.
pub fn append_row(
    path: &Path,
    values: &[FieldValue],
    labels: &[&str],
    delimiter: char,
) -> Result<bool, PersistenceError> {
    let write_header = !labels.is_empty() && !path.exists();

    let mut buf = String::new();
    if write_header {
        push_row(&mut buf, labels.iter().copied(), delimiter);
    }
    let cells: Vec<String> = values.iter().map(ToString::to_string).collect();
    push_row(&mut buf, cells.iter().map(String::as_str), delimiter);

    let persist = |source: std::io::Error| PersistenceError {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(persist)?;
    file.write_all(buf.as_bytes()).map_err(persist)?;

    Ok(write_header)
}

fn push_row<'a>(buf: &mut String, cells: impl Iterator<Item = &'a str>, delimiter: char) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            buf.push(delimiter);
        }
        push_cell(buf, cell, delimiter);
    }
    buf.push_str(LINE_TERMINATOR);
}

/// Quote a cell only when it contains the delimiter, a quote or a line break
fn push_cell(buf: &mut String, cell: &str, delimiter: char) {
    let needs_quotes = cell
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');
    if needs_quotes {
        buf.push('"');
        buf.push_str(&cell.replace('"', "\"\""));
        buf.push('"');
    } else {
        buf.push_str(cell);
    }
}

/// Append-only sink for one (session, modality) record file
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
    delimiter: char,
    rows_written: u64,
}

impl RecordWriter {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
            rows_written: 0,
        }
    }

    /// Value rows appended through this writer
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn append(&mut self, record: &FeatureRecord) -> Result<(), PersistenceError> {
        if append_row(&self.path, &record.values, record.labels, self.delimiter)? {
            tracing::debug!("Created record file {:?}", self.path);
        }
        self.rows_written += 1;
        Ok(())
    }
}
