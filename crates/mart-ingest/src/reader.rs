//! Lazy CSV row streams.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};
use tracing::debug;

use mart_model::{RawRecord, SourceKind, normalize_field_name};

use crate::error::{IngestError, Result};

/// Iterator over the data rows of one source file.
///
/// Rows are parsed on demand; a malformed row surfaces as an `Err` item at
/// its position in the stream.
pub struct RecordStream {
    kind: SourceKind,
    path: PathBuf,
    headers: Vec<String>,
    records: StringRecordsIntoIter<File>,
    row: usize,
}

impl RecordStream {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for RecordStream {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.records.next()?;
        self.row += 1;
        Some(match next {
            Ok(record) => Ok(RawRecord::new(
                self.kind,
                self.row,
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(record.iter()),
            )),
            Err(source) => Err(IngestError::CsvParse {
                path: self.path.clone(),
                row: self.row,
                source,
            }),
        })
    }
}

/// Open a source file and validate its header row.
///
/// Fails when the file cannot be opened or lacks one of the columns
/// [`SourceKind::expected_columns`] lists. Rows may be ragged: missing
/// trailing cells are absent fields and cells past the header are ignored.
pub fn open_source(kind: SourceKind, path: &Path) -> Result<RecordStream> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| IngestError::CsvParse {
            path: path.to_path_buf(),
            row: 0,
            source,
        })?
        .iter()
        .map(normalize_field_name)
        .collect();

    for column in kind.expected_columns() {
        if !headers.iter().any(|header| header == column) {
            return Err(IngestError::MissingColumn {
                column: (*column).to_string(),
                path: path.to_path_buf(),
            });
        }
    }

    debug!(
        source = %kind,
        path = %path.display(),
        columns = headers.len(),
        "opened source"
    );

    Ok(RecordStream {
        kind,
        path: path.to_path_buf(),
        headers,
        records: reader.into_records(),
        row: 0,
    })
}
