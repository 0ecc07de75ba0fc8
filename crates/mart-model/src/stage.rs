use crate::issue::{Issue, TerminalState};
use crate::source::RecordRef;

/// What a pipeline stage hands to the next one: surviving records, the
/// issues it raised, and the records that reached a terminal state here.
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub issues: Vec<Issue>,
    pub terminated: Vec<(RecordRef, TerminalState)>,
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
            terminated: Vec::new(),
        }
    }
}

impl<T> StageOutput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep(&mut self, record: T) {
        self.records.push(record);
    }

    pub fn issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn drop_record(&mut self, record: RecordRef, issue: Issue) {
        self.issues.push(issue);
        self.terminated.push((record, TerminalState::Dropped));
    }

    pub fn quarantine(&mut self, record: RecordRef, issue: Issue) {
        self.issues.push(issue);
        self.terminated.push((record, TerminalState::Quarantined));
    }

    pub fn count(&self, state: TerminalState) -> usize {
        self.terminated
            .iter()
            .filter(|(_, terminal)| *terminal == state)
            .count()
    }
}
