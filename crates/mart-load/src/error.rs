//! Error types for loading and export.

use std::path::PathBuf;

use mart_model::EntityType;
use thiserror::Error;

/// Failures that end a run. Per-record rejections are issues, not errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The store kept failing transiently for one entity.
    #[error("giving up on {entity} '{natural_key}' after {attempts} attempts: {message}")]
    RetriesExhausted {
        entity: EntityType,
        natural_key: String,
        attempts: u32,
        message: String,
    },

    /// Writing an exported table failed.
    #[error("failed to export {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Output directory could not be prepared.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LoadError>;
