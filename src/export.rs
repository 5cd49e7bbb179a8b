//! Delimited-text output for flushed tables.
//!
//! Scraped addresses and descriptions are full of commas and semicolons, so
//! the default format is the one the site's operators already consume:
//! UTF-16 (little endian, BOM at file start) with `[` as the field
//! delimiter. Rows are laid out by the `csv` writer, so cells that still
//! contain the delimiter, a quote or a line break are quoted with doubled
//! inner quotes, and then transcoded when UTF-16 is requested.

use crate::models::{FieldValue, Table};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const UTF16_BOM: [u8; 2] = [0xFF, 0xFE];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    Utf8,
    /// UTF-16LE with a byte order mark
    Utf16,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lay out rows: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0:?} cannot be used as a field delimiter")]
    InvalidDelimiter(char),
}

/// Durable destination for accumulated rows.
pub trait Sink {
    /// Append every row of `table`; returns the number of rows written.
    /// Calling it twice with the same table writes the rows twice.
    fn flush(&mut self, table: &Table) -> Result<usize, ExportError>;

    fn destination(&self) -> &Path;
}

/// The delimiter must be a single ASCII byte other than a quote or line break
pub fn validate_delimiter(delimiter: char) -> Result<u8, ExportError> {
    match delimiter {
        '"' | '\n' | '\r' => Err(ExportError::InvalidDelimiter(delimiter)),
        c if c.is_ascii() => Ok(c as u8),
        _ => Err(ExportError::InvalidDelimiter(delimiter)),
    }
}

/// Appends to one delimited file, writing the header only when the file
/// is created.
#[derive(Debug)]
pub struct DelimitedFileSink {
    path: PathBuf,
    encoding: OutputEncoding,
    delimiter: u8,
}

impl DelimitedFileSink {
    pub fn new(
        path: impl Into<PathBuf>,
        encoding: OutputEncoding,
        delimiter: char,
    ) -> Result<Self, ExportError> {
        let delimiter = validate_delimiter(delimiter)?;
        Ok(Self {
            path: path.into(),
            encoding,
            delimiter,
        })
    }

    /// UTF-8 delimited text for every row, header first when asked
    fn render(&self, table: &Table, with_header: bool) -> Result<Vec<u8>, ExportError> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        if with_header {
            writer.write_record(table.column_names())?;
        }
        for row in table.rows() {
            writer.write_record(row.into_iter().map(FieldValue::to_string))?;
        }
        writer.into_inner().map_err(|e| {
            let source = e.error();
            self.io_error(io::Error::new(source.kind(), source.to_string()))
        })
    }

    fn encode(&self, utf8: Vec<u8>, new_file: bool) -> Vec<u8> {
        match self.encoding {
            OutputEncoding::Utf8 => utf8,
            OutputEncoding::Utf16 => {
                let text = String::from_utf8_lossy(&utf8);
                let mut bytes = Vec::with_capacity(utf8.len() * 2 + 2);
                if new_file {
                    bytes.extend_from_slice(&UTF16_BOM);
                }
                for unit in text.encode_utf16() {
                    bytes.extend_from_slice(&unit.to_le_bytes());
                }
                bytes
            }
        }
    }

    fn io_error(&self, source: io::Error) -> ExportError {
        ExportError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Sink for DelimitedFileSink {
    fn flush(&mut self, table: &Table) -> Result<usize, ExportError> {
        let rows = table.max_len();
        if rows == 0 {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let new_file = !self.path.exists();
        let bytes = self.encode(self.render(table, new_file)?, new_file);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;

        info!("💾 Data saved to {} ({} rows)", self.path.display(), rows);
        Ok(rows)
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}
