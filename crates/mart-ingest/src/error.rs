//! Error types for raw source ingestion.

use std::path::PathBuf;

use mart_model::SourceKind;
use thiserror::Error;

/// Errors that make a source unreadable. Any of these aborts a run.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to open or read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No file in the data directory matched a source.
    #[error("no {kind} source file found in {dir}")]
    MissingSource { kind: SourceKind, dir: PathBuf },

    // === CSV Parsing Errors ===
    /// Malformed CSV content.
    #[error("failed to parse CSV {path} at row {row}: {source}")]
    CsvParse {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },

    /// Header row missing a column the source needs.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
