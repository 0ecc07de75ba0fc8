//! Raw source rows and their cleaned copies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The three raw feeds the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Customers,
    Products,
    Sales,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Customers, Self::Products, Self::Sales];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Sales => "sales",
        }
    }

    /// File name used when the caller does not supply one.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Customers => "customers_raw.csv",
            Self::Products => "products_raw.csv",
            Self::Sales => "sales_raw.csv",
        }
    }

    /// Columns a source file must carry to be readable at all.
    pub fn expected_columns(self) -> &'static [&'static str] {
        match self {
            Self::Customers => &[
                "customer_id",
                "first_name",
                "last_name",
                "email",
                "phone",
                "city",
                "registration_date",
            ],
            Self::Products => &[
                "product_id",
                "product_name",
                "category",
                "price",
                "stock_quantity",
            ],
            Self::Sales => &[
                "transaction_id",
                "customer_id",
                "product_id",
                "quantity",
                "unit_price",
                "transaction_date",
                "status",
            ],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim and case-fold a natural key so that "C001" and " c001 " match.
pub fn normalize_natural_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalize a column header: trim, drop a UTF-8 BOM, lowercase, and
/// collapse inner whitespace to underscores.
pub fn normalize_field_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Diagnostic handle for a single source row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub source: SourceKind,
    /// 1-based data row number (header excluded).
    pub row: usize,
    /// Natural key as written in the source, when one could be extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
}

impl RecordRef {
    pub fn new(source: SourceKind, row: usize) -> Self {
        Self {
            source,
            row,
            natural_key: None,
        }
    }

    #[must_use]
    pub fn with_natural_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.natural_key = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        self
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.natural_key {
            Some(key) => write!(f, "{} row {} [{}]", self.source, self.row, key),
            None => write!(f, "{} row {}", self.source, self.row),
        }
    }
}

/// One row exactly as read from a source. Never modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    source: SourceKind,
    row: usize,
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new<I, K, V>(source: SourceKind, row: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (normalize_field_name(name.as_ref()), value.into()))
            .collect();
        Self {
            source,
            row,
            fields,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn row(&self) -> usize {
        self.row
    }

    /// Field value, or `None` when absent or blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.source, self.row)
    }
}

/// Transformed copy of a [`RawRecord`]; blanks are absent, values are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    origin: RecordRef,
    fields: BTreeMap<String, String>,
}

impl CleanRecord {
    pub fn from_raw(raw: &RawRecord, natural_key: &str) -> Self {
        let fields = raw
            .fields()
            .filter_map(|(name, value)| {
                let value = value.trim();
                (!value.is_empty()).then(|| (name.to_string(), value.to_string()))
            })
            .collect();
        Self {
            origin: raw.record_ref().with_natural_key(natural_key),
            fields,
        }
    }

    pub fn origin(&self) -> &RecordRef {
        &self.origin
    }

    pub fn natural_key(&self) -> Option<&str> {
        self.origin.natural_key.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Copy of this record with `field` set to `value`.
    #[must_use]
    pub fn with_value(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Copy of this record with `field` removed.
    #[must_use]
    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }
}
