//! Configuration options for the transform-and-load pipeline.
//!
//! Everything here is fixed at run start. The defaults reproduce the
//! cleaning rules of the FlexiMart retail feeds; a TOML file may override
//! any section.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::source::SourceKind;

/// Placeholder replaced by the record's natural key in default values.
pub const NATURAL_KEY_PLACEHOLDER: &str = "{id}";

/// What to do when a field is absent or blank.
///
/// Written in configuration files as `required`, `skip`, `median` or
/// `default:<value>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldPolicy {
    /// Drop the whole record.
    Required,
    /// Substitute a fixed value; `{id}` expands to the natural key.
    Default(String),
    /// Substitute the median of the present values in the same batch.
    Median,
    /// Leave the field absent.
    Skip,
}

impl FieldPolicy {
    pub fn default_value(value: impl Into<String>) -> Self {
        Self::Default(value.into())
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

impl FromStr for FieldPolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Some(value) = trimmed.strip_prefix("default:") {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidPolicy {
                    value: raw.to_string(),
                    reason: "default value is empty".to_string(),
                });
            }
            return Ok(Self::Default(value.trim().to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "median" => Ok(Self::Median),
            "skip" => Ok(Self::Skip),
            _ => Err(ConfigError::InvalidPolicy {
                value: raw.to_string(),
                reason: "expected required, skip, median or default:<value>".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FieldPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldPolicy> for String {
    fn from(policy: FieldPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::Default(value) => write!(f, "default:{value}"),
            Self::Median => f.write_str("median"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// Per-field policies for each source. Fields not listed are `skip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPolicies {
    pub customers: BTreeMap<String, FieldPolicy>,
    pub products: BTreeMap<String, FieldPolicy>,
    pub sales: BTreeMap<String, FieldPolicy>,
}

impl FieldPolicies {
    pub fn for_source(&self, kind: SourceKind) -> &BTreeMap<String, FieldPolicy> {
        match kind {
            SourceKind::Customers => &self.customers,
            SourceKind::Products => &self.products,
            SourceKind::Sales => &self.sales,
        }
    }

    pub fn policy(&self, kind: SourceKind, field: &str) -> &FieldPolicy {
        self.for_source(kind)
            .get(field)
            .unwrap_or(&FieldPolicy::Skip)
    }
}

impl Default for FieldPolicies {
    fn default() -> Self {
        fn table(entries: &[(&str, FieldPolicy)]) -> BTreeMap<String, FieldPolicy> {
            entries
                .iter()
                .map(|(field, policy)| ((*field).to_string(), policy.clone()))
                .collect()
        }
        Self {
            customers: table(&[
                ("customer_id", FieldPolicy::Required),
                ("first_name", FieldPolicy::Required),
                ("last_name", FieldPolicy::Required),
                ("email", FieldPolicy::default_value("unknown_email_{id}")),
                ("phone", FieldPolicy::Skip),
                ("city", FieldPolicy::default_value("Unknown")),
                ("registration_date", FieldPolicy::Skip),
            ]),
            products: table(&[
                ("product_id", FieldPolicy::Required),
                ("product_name", FieldPolicy::Required),
                ("category", FieldPolicy::default_value("Uncategorized")),
                ("price", FieldPolicy::Median),
                ("stock_quantity", FieldPolicy::Median),
            ]),
            sales: table(&[
                ("transaction_id", FieldPolicy::Required),
                ("customer_id", FieldPolicy::Required),
                ("product_id", FieldPolicy::Required),
                ("quantity", FieldPolicy::Required),
                ("unit_price", FieldPolicy::Required),
                ("transaction_date", FieldPolicy::Required),
                ("status", FieldPolicy::default_value("Pending")),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneOptions {
    /// Country code used when a number carries none, e.g. `+91`.
    pub default_country_code: String,
}

impl Default for PhoneOptions {
    fn default() -> Self {
        Self {
            default_country_code: "+91".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOptions {
    /// Raw spelling (matched case-insensitively) to canonical category.
    pub synonyms: BTreeMap<String, String>,
}

impl Default for CategoryOptions {
    fn default() -> Self {
        let synonyms = [
            ("electronics", "Electronics"),
            ("electronic", "Electronics"),
            ("fashion", "Fashion"),
            ("groceries", "Groceries"),
            ("grocery", "Groceries"),
            ("grocer", "Groceries"),
        ]
        .into_iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
        .collect();
        Self { synonyms }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateOptions {
    /// `chrono` strftime patterns, tried in order; the first match wins.
    pub formats: Vec<String>,
}

impl Default for DateOptions {
    fn default() -> Self {
        let formats = ["%Y-%m-%d", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"];
        Self {
            formats: formats.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total insert attempts for a transient storage failure.
    pub attempts: u32,
    /// Linear backoff step; attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl RetryOptions {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 200,
        }
    }
}

/// Complete configuration surface of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub policies: FieldPolicies,
    pub phone: PhoneOptions,
    pub categories: CategoryOptions,
    pub dates: DateOptions,
    pub retry: RetryOptions,
}

/// Fields forming each source's natural key; these must be `required`.
pub fn natural_key_fields(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::Customers => &["customer_id"],
        SourceKind::Products => &["product_id"],
        SourceKind::Sales => &["transaction_id", "product_id"],
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        for kind in SourceKind::ALL {
            for field in natural_key_fields(kind) {
                if !self.policies.policy(kind, field).is_required() {
                    return Err(ConfigError::KeyFieldNotRequired {
                        kind,
                        field: (*field).to_string(),
                    });
                }
            }
        }

        let code = &self.phone.default_country_code;
        let digits = code.strip_prefix('+').unwrap_or_default();
        if digits.is_empty() || digits.len() > 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidCountryCode {
                value: code.clone(),
            });
        }

        if self.dates.formats.is_empty() {
            return Err(ConfigError::NoDateFormats);
        }
        for format in &self.dates.formats {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidDateFormat {
                    format: format.clone(),
                });
            }
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidRetry {
                reason: "attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
