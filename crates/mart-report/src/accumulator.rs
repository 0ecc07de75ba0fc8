//! Incremental quality accounting.

use std::collections::BTreeMap;

use tracing::warn;

use mart_model::{Issue, IssueKind, RecordRef, SourceKind, StageOutput, TerminalState};

use crate::report::{FileQuality, QualityReport};

/// Pure counter sink fed by every stage.
///
/// Duplicate, missing-value and standardized counts come from issues;
/// quarantined and loaded counts come from terminal transitions only, so a
/// record is never counted twice. Accumulators filled on different threads
/// are combined with [`merge`](Self::merge).
#[derive(Debug, Clone, Default)]
pub struct QualityAccumulator {
    files: BTreeMap<SourceKind, FileQuality>,
}

impl QualityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the file a source was read from.
    pub fn register_file(&mut self, source: SourceKind, file: impl Into<String>) {
        let file = file.into();
        self.files
            .entry(source)
            .and_modify(|entry| entry.file.clone_from(&file))
            .or_insert_with(|| FileQuality::new(source, file));
    }

    fn entry(&mut self, source: SourceKind) -> &mut FileQuality {
        self.files
            .entry(source)
            .or_insert_with(|| FileQuality::new(source, source.default_file_name()))
    }

    pub fn record_processed(&mut self, source: SourceKind, count: usize) {
        self.entry(source).processed += count;
    }

    pub fn record_issue(&mut self, issue: &Issue) {
        let entry = self.entry(issue.record.source);
        match issue.kind {
            IssueKind::Duplicate => entry.duplicates_removed += 1,
            IssueKind::MissingValue => entry.missing_handled += 1,
            IssueKind::Standardized => entry.standardized += 1,
            IssueKind::Quarantined => {}
        }
    }

    pub fn record_issues<'a, I>(&mut self, issues: I)
    where
        I: IntoIterator<Item = &'a Issue>,
    {
        for issue in issues {
            self.record_issue(issue);
        }
    }

    pub fn record_terminal(&mut self, record: &RecordRef, state: TerminalState) {
        let entry = self.entry(record.source);
        match state {
            TerminalState::Dropped => entry.dropped += 1,
            TerminalState::Quarantined => entry.quarantined += 1,
            TerminalState::Loaded => entry.loaded += 1,
        }
    }

    /// Count a stage's issues and terminal transitions.
    pub fn observe<T>(&mut self, output: &StageOutput<T>) {
        self.record_issues(&output.issues);
        for (record, state) in &output.terminated {
            self.record_terminal(record, *state);
        }
    }

    pub fn merge(&mut self, other: QualityAccumulator) {
        for (source, quality) in other.files {
            match self.files.get_mut(&source) {
                Some(existing) => existing.absorb(&quality),
                None => {
                    self.files.insert(source, quality);
                }
            }
        }
    }

    /// Current counters, without ending accumulation.
    pub fn snapshot(&self) -> QualityReport {
        QualityReport {
            files: self.files.values().cloned().collect(),
        }
    }

    /// Final report. Files whose records are not all accounted for are logged.
    pub fn finalize(self) -> QualityReport {
        let report = QualityReport {
            files: self.files.into_values().collect(),
        };
        for file in report.files.iter().filter(|file| !file.conserves()) {
            warn!(
                file = %file.file,
                processed = file.processed,
                unaccounted = file.in_flight(),
                "quality counters do not balance"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: SourceKind, row: usize) -> RecordRef {
        RecordRef::new(source, row)
    }

    #[test]
    fn issues_and_terminals_feed_separate_counters() {
        let mut acc = QualityAccumulator::new();
        acc.register_file(SourceKind::Products, "products_raw.csv");
        acc.record_processed(SourceKind::Products, 3);

        let mut stage: StageOutput<()> = StageOutput::new();
        let dup = record(SourceKind::Products, 2);
        stage.drop_record(dup.clone(), Issue::duplicate(dup, 1));
        let bad = record(SourceKind::Products, 3);
        stage.quarantine(bad.clone(), Issue::quarantined(bad, Some("price"), "invalid amount"));
        acc.observe(&stage);
        acc.record_terminal(&record(SourceKind::Products, 1), TerminalState::Loaded);

        let report = acc.finalize();
        let products = report.file(SourceKind::Products).unwrap();
        assert_eq!(products.duplicates_removed, 1);
        assert_eq!(products.quarantined, 1);
        assert_eq!(products.loaded, 1);
        assert!(products.conserves());
    }

    #[test]
    fn merged_accumulators_add_up() {
        let mut customers = QualityAccumulator::new();
        customers.record_processed(SourceKind::Customers, 2);
        let mut again = QualityAccumulator::new();
        again.record_processed(SourceKind::Customers, 1);
        again.record_processed(SourceKind::Products, 4);

        customers.merge(again);
        let report = customers.snapshot();
        assert_eq!(report.file(SourceKind::Customers).unwrap().processed, 3);
        assert_eq!(report.file(SourceKind::Products).unwrap().processed, 4);
        assert_eq!(report.files[0].file, "customers_raw.csv");
    }
}
