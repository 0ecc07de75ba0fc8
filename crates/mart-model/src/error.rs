use thiserror::Error;

use crate::source::SourceKind;

/// Problems with a pipeline configuration, detected before any row is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid field policy '{value}': {reason}")]
    InvalidPolicy { value: String, reason: String },

    #[error("invalid default country code '{value}' (expected '+' and 1-3 digits)")]
    InvalidCountryCode { value: String },

    #[error("at least one accepted date format is required")]
    NoDateFormats,

    #[error("invalid date format '{format}'")]
    InvalidDateFormat { format: String },

    #[error("natural key field {kind}.{field} must use the 'required' policy")]
    KeyFieldNotRequired { kind: SourceKind, field: String },

    #[error("invalid retry settings: {reason}")]
    InvalidRetry { reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
