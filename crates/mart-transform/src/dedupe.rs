//! First-occurrence-wins deduplication by natural key.

use std::collections::BTreeMap;

use mart_model::{
    Issue, RawRecord, SourceKind, StageOutput, natural_key_fields, normalize_natural_key,
};

/// Which fields make up a source's natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKeyRule {
    fields: Vec<String>,
}

impl NaturalKeyRule {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// `customer_id`, `product_id`, or `transaction_id|product_id` for sales.
    pub fn for_source(kind: SourceKind) -> Self {
        Self::new(natural_key_fields(kind).iter().copied())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Key as written in the source: trimmed parts joined by `|`.
    pub fn display_key(&self, record: &RawRecord) -> String {
        self.fields
            .iter()
            .map(|field| record.get(field).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Trimmed, case-folded key; `None` when any part is blank.
    pub fn normalized_key(&self, record: &RawRecord) -> Option<String> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            parts.push(normalize_natural_key(record.get(field)?));
        }
        Some(parts.join("|"))
    }
}

/// Streaming deduplicator for one source.
///
/// Records whose key is incomplete pass through untouched; the missing-value
/// stage decides what happens to them.
#[derive(Debug)]
pub struct Deduplicator {
    rule: NaturalKeyRule,
    first_rows: BTreeMap<String, usize>,
    output: StageOutput<RawRecord>,
}

impl Deduplicator {
    pub fn new(rule: NaturalKeyRule) -> Self {
        Self {
            rule,
            first_rows: BTreeMap::new(),
            output: StageOutput::new(),
        }
    }

    /// Offer the next record; returns `false` when it was a duplicate.
    pub fn admit(&mut self, record: RawRecord) -> bool {
        let Some(key) = self.rule.normalized_key(&record) else {
            self.output.keep(record);
            return true;
        };
        if let Some(&first_row) = self.first_rows.get(&key) {
            let record_ref = record
                .record_ref()
                .with_natural_key(self.rule.display_key(&record));
            self.output
                .drop_record(record_ref.clone(), Issue::duplicate(record_ref, first_row));
            return false;
        }
        self.first_rows.insert(key, record.row());
        self.output.keep(record);
        true
    }

    pub fn finish(self) -> StageOutput<RawRecord> {
        self.output
    }
}

/// Deduplicate a whole sequence at once.
pub fn dedupe<I>(rule: &NaturalKeyRule, records: I) -> StageOutput<RawRecord>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut deduplicator = Deduplicator::new(rule.clone());
    for record in records {
        deduplicator.admit(record);
    }
    deduplicator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(row: usize, transaction: &str, product: &str) -> RawRecord {
        RawRecord::new(
            SourceKind::Sales,
            row,
            [("transaction_id", transaction), ("product_id", product)],
        )
    }

    #[test]
    fn composite_key_joins_parts() {
        let rule = NaturalKeyRule::for_source(SourceKind::Sales);
        let record = sale(1, " T001 ", "p001");
        assert_eq!(rule.display_key(&record), "T001|p001");
        assert_eq!(rule.normalized_key(&record).as_deref(), Some("t001|p001"));
    }

    #[test]
    fn incomplete_key_is_not_deduplicated() {
        let rule = NaturalKeyRule::for_source(SourceKind::Sales);
        let output = dedupe(&rule, [sale(1, "T001", ""), sale(2, "T001", "")]);
        assert_eq!(output.records.len(), 2);
        assert!(output.issues.is_empty());
    }

    #[test]
    fn same_transaction_different_products_are_distinct() {
        let rule = NaturalKeyRule::for_source(SourceKind::Sales);
        let output = dedupe(
            &rule,
            [sale(1, "T001", "P001"), sale(2, "T001", "P002"), sale(3, "t001", "P001")],
        );
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].detail, "duplicate of row 1");
        assert_eq!(output.terminated[0].0.row, 3);
    }
}
