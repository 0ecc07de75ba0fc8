//! The finalized quality report and its renderings.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use mart_model::SourceKind;

/// Counters for one source file.
///
/// `dropped` (duplicates and required-field failures) is tracked so the
/// conservation law can be checked, but is not part of the published report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQuality {
    pub file: String,
    pub source: SourceKind,
    pub processed: usize,
    pub duplicates_removed: usize,
    pub missing_handled: usize,
    pub standardized: usize,
    pub quarantined: usize,
    pub loaded: usize,
    #[serde(skip)]
    pub dropped: usize,
}

impl FileQuality {
    pub fn new(source: SourceKind, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source,
            processed: 0,
            duplicates_removed: 0,
            missing_handled: 0,
            standardized: 0,
            quarantined: 0,
            loaded: 0,
            dropped: 0,
        }
    }

    /// Records that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.processed
            .saturating_sub(self.dropped + self.quarantined + self.loaded)
    }

    /// `processed == dropped + quarantined + loaded`.
    pub fn conserves(&self) -> bool {
        self.processed == self.dropped + self.quarantined + self.loaded
    }

    pub(crate) fn absorb(&mut self, other: &FileQuality) {
        self.processed += other.processed;
        self.duplicates_removed += other.duplicates_removed;
        self.missing_handled += other.missing_handled;
        self.standardized += other.standardized;
        self.quarantined += other.quarantined;
        self.loaded += other.loaded;
        self.dropped += other.dropped;
    }
}

/// One entry per source file, in customers, products, sales order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub files: Vec<FileQuality>,
}

impl QualityReport {
    pub fn file(&self, source: SourceKind) -> Option<&FileQuality> {
        self.files.iter().find(|file| file.source == source)
    }

    pub fn is_conserved(&self) -> bool {
        self.files.iter().all(FileQuality::conserves)
    }

    pub fn total_loaded(&self) -> usize {
        self.files.iter().map(|file| file.loaded).sum()
    }

    pub fn total_quarantined(&self) -> usize {
        self.files.iter().map(|file| file.quarantined).sum()
    }

    /// Plain-text report in the `data_quality_report.txt` layout.
    pub fn render_text(&self) -> String {
        let mut out = String::from("Data Quality Report (ETL Summary):\n\n");
        for file in &self.files {
            let _ = writeln!(out, "File: {}", file.file);
            let _ = writeln!(out, "- Records Processed: {}", file.processed);
            let _ = writeln!(out, "- Duplicates Removed: {}", file.duplicates_removed);
            let _ = writeln!(out, "- Missing Values Handled: {}", file.missing_handled);
            let _ = writeln!(out, "- Values Standardized: {}", file.standardized);
            let _ = writeln!(out, "- Records Quarantined: {}", file.quarantined);
            let _ = writeln!(out, "- Records Loaded Successfully: {}", file.loaded);
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
