//! Per-field missing-value policies.
//!
//! Each source field carries one [`FieldPolicy`]. A record missing any
//! `required` field is dropped before anything is filled, so a dropped record
//! never reports fills.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info_span};

use mart_model::options::NATURAL_KEY_PLACEHOLDER;
use mart_model::{CleanRecord, FieldPolicies, FieldPolicy, Issue, RawRecord, SourceKind, StageOutput};

use crate::dedupe::NaturalKeyRule;
use crate::normalization::parse_decimal;

/// Outcome of applying a policy to one absent field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResolution {
    /// Nothing to do; the field stays absent.
    Kept(CleanRecord),
    /// A value was substituted.
    Filled(CleanRecord, Issue),
    /// The record cannot continue.
    Dropped(Issue),
}

/// Apply `policy` to `field`, which `record` does not carry.
///
/// `median` is the batch median for `median` fields; without one the field
/// behaves as `required`.
pub fn resolve_absent(
    policy: &FieldPolicy,
    field: &str,
    record: CleanRecord,
    median: Option<&str>,
) -> FieldResolution {
    let origin = record.origin().clone();
    match policy {
        FieldPolicy::Skip => FieldResolution::Kept(record),
        FieldPolicy::Required => FieldResolution::Dropped(Issue::missing(origin, field, "dropped")),
        FieldPolicy::Default(template) => {
            let value = template.replace(
                NATURAL_KEY_PLACEHOLDER,
                record.natural_key().unwrap_or_default(),
            );
            let issue = Issue::missing(origin, field, format!("filled with '{value}'"));
            FieldResolution::Filled(record.with_value(field, value), issue)
        }
        FieldPolicy::Median => match median {
            Some(value) => {
                let issue = Issue::missing(origin, field, format!("filled with median {value}"));
                FieldResolution::Filled(record.with_value(field, value), issue)
            }
            None => FieldResolution::Dropped(Issue::missing(
                origin,
                field,
                "dropped (no values to take a median from)",
            )),
        },
    }
}

/// Median of the parseable values in `values`.
///
/// When every input is a whole number the median is rounded half away from
/// zero to a whole number; otherwise it keeps two decimal places.
pub fn median<'a, I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut numbers: Vec<Decimal> = values.into_iter().filter_map(parse_decimal).collect();
    if numbers.is_empty() {
        return None;
    }
    numbers.sort();
    let mid = numbers.len() / 2;
    let middle = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / Decimal::TWO
    } else {
        numbers[mid]
    };
    let integral = numbers.iter().all(|n| n.fract().is_zero());
    let rounded = if integral {
        middle.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    } else {
        middle.round_dp(2)
    };
    Some(rounded.normalize())
}

/// Applies the configured policy table to deduplicated batches.
#[derive(Debug, Clone, Default)]
pub struct MissingValueResolver {
    policies: FieldPolicies,
}

impl MissingValueResolver {
    pub fn new(policies: FieldPolicies) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &FieldPolicies {
        &self.policies
    }

    /// Batch medians for every `median` field of `kind`.
    fn medians(&self, kind: SourceKind, records: &[RawRecord]) -> BTreeMap<String, String> {
        self.policies
            .for_source(kind)
            .iter()
            .filter(|(_, policy)| matches!(policy, FieldPolicy::Median))
            .filter_map(|(field, _)| {
                let value = median(records.iter().filter_map(|record| record.get(field)))?;
                Some((field.clone(), value.to_string()))
            })
            .collect()
    }

    /// Resolve every absent field of every record in one deduplicated batch.
    pub fn resolve(&self, kind: SourceKind, records: Vec<RawRecord>) -> StageOutput<CleanRecord> {
        let _span = info_span!("resolve_missing", source = %kind, records = records.len()).entered();

        let rule = NaturalKeyRule::for_source(kind);
        let medians = self.medians(kind, &records);
        let policies = self.policies.for_source(kind);
        let mut output = StageOutput::new();

        'records: for raw in &records {
            let natural_key = match rule.normalized_key(raw) {
                Some(_) => rule.display_key(raw),
                None => String::new(),
            };
            let mut record = CleanRecord::from_raw(raw, &natural_key);

            // Required fields first: a dropped record reports no fills.
            for (field, policy) in policies {
                let unresolvable = match policy {
                    FieldPolicy::Required => true,
                    FieldPolicy::Median => !medians.contains_key(field),
                    _ => false,
                };
                if unresolvable && record.get(field).is_none() {
                    if let FieldResolution::Dropped(issue) =
                        resolve_absent(policy, field, record, None)
                    {
                        debug!(record = %issue.record, field = %field, "dropped record");
                        output.drop_record(issue.record.clone(), issue);
                    }
                    continue 'records;
                }
            }

            let mut fills = Vec::new();
            for (field, policy) in policies {
                if record.get(field).is_some() {
                    continue;
                }
                record = match resolve_absent(policy, field, record, medians.get(field).map(String::as_str)) {
                    FieldResolution::Kept(record) => record,
                    FieldResolution::Filled(record, issue) => {
                        fills.push(issue);
                        record
                    }
                    // Unresolvable fields were handled above.
                    FieldResolution::Dropped(issue) => {
                        output.drop_record(issue.record.clone(), issue);
                        continue 'records;
                    }
                };
            }
            output.issues.extend(fills);
            output.keep(record);
        }

        debug!(
            kept = output.records.len(),
            dropped = output.terminated.len(),
            issues = output.issues.len(),
            "resolved missing values"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(row: usize, fields: &[(&str, &str)]) -> RawRecord {
        RawRecord::new(SourceKind::Customers, row, fields.iter().copied())
    }

    fn product(row: usize, id: &str, price: &str, stock: &str) -> RawRecord {
        RawRecord::new(
            SourceKind::Products,
            row,
            [
                ("product_id", id),
                ("product_name", "Item"),
                ("category", "electronics"),
                ("price", price),
                ("stock_quantity", stock),
            ],
        )
    }

    #[test]
    fn default_fill_expands_natural_key() {
        let resolver = MissingValueResolver::default();
        let output = resolver.resolve(
            SourceKind::Customers,
            vec![customer(
                5,
                &[
                    ("customer_id", "C005"),
                    ("first_name", "Anita"),
                    ("last_name", "Rao"),
                    ("email", ""),
                ],
            )],
        );
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].get("email"), Some("unknown_email_C005"));
        assert_eq!(output.records[0].get("city"), Some("Unknown"));
        assert_eq!(output.records[0].get("phone"), None);
        assert_eq!(output.issues.len(), 2);
        assert!(output.issues.iter().all(|issue| issue.detail.starts_with("filled")));
    }

    #[test]
    fn required_failure_drops_without_fills() {
        let resolver = MissingValueResolver::default();
        let output = resolver.resolve(
            SourceKind::Customers,
            vec![customer(2, &[("customer_id", "C002"), ("first_name", "Priya")])],
        );
        assert!(output.records.is_empty());
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].field.as_deref(), Some("last_name"));
        assert_eq!(output.issues[0].detail, "dropped");
        assert_eq!(output.count(mart_model::TerminalState::Dropped), 1);
    }

    #[test]
    fn median_fills_from_batch() {
        let resolver = MissingValueResolver::default();
        let output = resolver.resolve(
            SourceKind::Products,
            vec![
                product(1, "P001", "100.50", "10"),
                product(2, "P002", "", "15"),
                product(3, "P003", "300", ""),
            ],
        );
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.records[1].get("price"), Some("200.25"));
        assert_eq!(output.records[2].get("stock_quantity"), Some("13"));
    }

    #[test]
    fn median_without_values_drops() {
        let resolver = MissingValueResolver::default();
        let output = resolver.resolve(SourceKind::Products, vec![product(1, "P001", "", "4")]);
        assert!(output.records.is_empty());
        assert_eq!(output.issues[0].field.as_deref(), Some("price"));
    }

    #[test]
    fn median_rounding() {
        assert_eq!(median(["1", "2"]), Some(Decimal::from(2)));
        assert_eq!(median(["3", "1", "2"]), Some(Decimal::from(2)));
        assert_eq!(median(["1.5", "2.25"]).map(|m| m.to_string()).as_deref(), Some("1.88"));
        assert_eq!(median(["x"]), None);
    }
}
