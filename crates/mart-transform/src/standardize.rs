//! Field-level standardization of resolved records.

use tracing::{debug, info_span, trace};

use mart_model::{
    CaseFoldMap, CleanRecord, FieldPolicies, Issue, PipelineConfig, SourceKind, StageOutput,
};

use crate::missing::{FieldResolution, resolve_absent};
use crate::normalization::{format_iso_date, normalize_category, normalize_phone, parse_date, title_case};

/// How a field's value is standardized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Phone,
    Category,
    Date,
    Title,
}

/// Standardized fields of each source, in processing order.
pub fn standardized_fields(kind: SourceKind) -> &'static [(&'static str, FieldClass)] {
    match kind {
        SourceKind::Customers => &[
            ("phone", FieldClass::Phone),
            ("city", FieldClass::Title),
            ("registration_date", FieldClass::Date),
        ],
        SourceKind::Products => &[("category", FieldClass::Category)],
        SourceKind::Sales => &[("transaction_date", FieldClass::Date)],
    }
}

enum Verdict {
    Keep(CleanRecord),
    Drop(Issue),
    Quarantine(Issue),
}

/// Normalizes phone, category, date and city values.
#[derive(Debug, Clone)]
pub struct Standardizer {
    policies: FieldPolicies,
    country_code: String,
    synonyms: CaseFoldMap,
    date_formats: Vec<String>,
}

impl Standardizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            policies: config.policies.clone(),
            country_code: config.phone.default_country_code.clone(),
            synonyms: CaseFoldMap::new(&config.categories.synonyms),
            date_formats: config.dates.formats.clone(),
        }
    }

    /// Standardize a resolved batch.
    ///
    /// Issues for a record are only published when the record survives; a
    /// quarantined record reports the quarantine alone.
    pub fn standardize(&self, kind: SourceKind, records: Vec<CleanRecord>) -> StageOutput<CleanRecord> {
        let _span = info_span!("standardize", source = %kind, records = records.len()).entered();
        let mut output = StageOutput::new();

        for record in records {
            let mut pending = Vec::new();
            match self.standardize_record(kind, record, &mut pending) {
                Verdict::Keep(record) => {
                    output.issues.extend(pending);
                    output.keep(record);
                }
                Verdict::Drop(issue) => output.drop_record(issue.record.clone(), issue),
                Verdict::Quarantine(issue) => {
                    debug!(record = %issue.record, detail = %issue.detail, "quarantined record");
                    output.quarantine(issue.record.clone(), issue);
                }
            }
        }

        debug!(
            kept = output.records.len(),
            quarantined = output.terminated.len(),
            "standardized batch"
        );
        output
    }

    fn standardize_record(
        &self,
        kind: SourceKind,
        mut record: CleanRecord,
        pending: &mut Vec<Issue>,
    ) -> Verdict {
        for &(field, class) in standardized_fields(kind) {
            let Some(raw) = record.get(field).map(str::to_string) else {
                continue;
            };
            let origin = record.origin().clone();
            let value = match class {
                FieldClass::Phone => match normalize_phone(&raw, &self.country_code) {
                    Some(phone) => phone,
                    None => {
                        let policy = self.policies.policy(kind, field);
                        record = match resolve_absent(policy, field, record.without(field), None) {
                            FieldResolution::Kept(record) => {
                                pending.push(Issue::missing(
                                    origin,
                                    field,
                                    format!("cleared invalid value '{raw}'"),
                                ));
                                record
                            }
                            FieldResolution::Filled(record, issue) => {
                                pending.push(issue);
                                record
                            }
                            FieldResolution::Dropped(issue) => return Verdict::Drop(issue),
                        };
                        continue;
                    }
                },
                FieldClass::Category => normalize_category(&raw, &self.synonyms),
                FieldClass::Title => title_case(&raw),
                FieldClass::Date => match parse_date(&raw, &self.date_formats) {
                    Some(date) => format_iso_date(date),
                    None => {
                        return Verdict::Quarantine(Issue::quarantined(
                            origin,
                            Some(field),
                            format!("unparseable date '{raw}'"),
                        ));
                    }
                },
            };
            if value != raw {
                trace!(record = %origin, field = %field, "standardized value");
                pending.push(Issue::standardized(origin, field, &raw, &value));
                record = record.with_value(field, value);
            }
        }
        Verdict::Keep(record)
    }
}
