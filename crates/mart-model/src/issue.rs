use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source::RecordRef;

/// Kind of cleaning decision an [`Issue`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Duplicate,
    MissingValue,
    Standardized,
    Quarantined,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::MissingValue => "missing_value",
            Self::Standardized => "standardized",
            Self::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cleaning decision, emitted alongside the transformed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub record: RecordRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub kind: IssueKind,
    pub detail: String,
}

impl Issue {
    pub fn duplicate(record: RecordRef, first_row: usize) -> Self {
        Self {
            record,
            field: None,
            kind: IssueKind::Duplicate,
            detail: format!("duplicate of row {first_row}"),
        }
    }

    pub fn missing(record: RecordRef, field: &str, detail: impl Into<String>) -> Self {
        Self {
            record,
            field: Some(field.to_string()),
            kind: IssueKind::MissingValue,
            detail: detail.into(),
        }
    }

    pub fn standardized(record: RecordRef, field: &str, from: &str, to: &str) -> Self {
        Self {
            record,
            field: Some(field.to_string()),
            kind: IssueKind::Standardized,
            detail: format!("'{from}' -> '{to}'"),
        }
    }

    pub fn quarantined(record: RecordRef, field: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            record,
            field: field.map(str::to_string),
            kind: IssueKind::Quarantined,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} {}.{}: {}", self.kind, self.record, field, self.detail),
            None => write!(f, "{} {}: {}", self.kind, self.record, self.detail),
        }
    }
}

/// Where a record's journey through the pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Dropped,
    Quarantined,
    Loaded,
}
