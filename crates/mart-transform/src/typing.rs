//! Conversion of standardized records into typed drafts.
//!
//! Values that cannot be typed (non-numeric prices, fractional quantities,
//! negative amounts) quarantine the record.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use mart_model::{CleanRecord, CustomerDraft, Issue, ProductDraft, SalesLine, StageOutput};

use crate::normalization::{parse_count, parse_date, parse_decimal};

type Typed<T> = std::result::Result<T, Issue>;

const ISO_DATE: [&str; 1] = ["%Y-%m-%d"];

fn text(record: &CleanRecord, field: &str) -> Typed<String> {
    record.get(field).map(str::to_string).ok_or_else(|| {
        Issue::quarantined(record.origin().clone(), Some(field), "missing value")
    })
}

fn invalid(record: &CleanRecord, field: &str, what: &str) -> Issue {
    Issue::quarantined(
        record.origin().clone(),
        Some(field),
        format!("{what} '{}'", record.get(field).unwrap_or_default()),
    )
}

fn amount(record: &CleanRecord, field: &str) -> Typed<Decimal> {
    text(record, field)?;
    parse_decimal(record.get(field).unwrap_or_default())
        .filter(|value| !value.is_sign_negative())
        .ok_or_else(|| invalid(record, field, "invalid amount"))
}

fn count(record: &CleanRecord, field: &str) -> Typed<u32> {
    text(record, field)?;
    parse_count(record.get(field).unwrap_or_default())
        .ok_or_else(|| invalid(record, field, "invalid count"))
}

fn date(record: &CleanRecord, field: &str) -> Typed<Option<NaiveDate>> {
    match record.get(field) {
        None => Ok(None),
        Some(raw) => parse_date(raw, &ISO_DATE)
            .map(Some)
            .ok_or_else(|| invalid(record, field, "invalid date")),
    }
}

fn collect<T, F>(records: Vec<CleanRecord>, label: &str, convert: F) -> StageOutput<T>
where
    F: Fn(&CleanRecord) -> Typed<T>,
{
    let mut output = StageOutput::new();
    for record in records {
        match convert(&record) {
            Ok(draft) => output.keep(draft),
            Err(issue) => {
                debug!(record = %issue.record, detail = %issue.detail, "untypeable {label}");
                output.quarantine(issue.record.clone(), issue);
            }
        }
    }
    output
}

pub fn customer_drafts(records: Vec<CleanRecord>) -> StageOutput<CustomerDraft> {
    collect(records, "customer", |record| {
        Ok(CustomerDraft {
            origin: record.origin().clone(),
            customer_id: text(record, "customer_id")?,
            first_name: text(record, "first_name")?,
            last_name: text(record, "last_name")?,
            email: text(record, "email")?,
            phone: record.get("phone").map(str::to_string),
            city: record.get("city").map(str::to_string),
            registration_date: date(record, "registration_date")?,
        })
    })
}

pub fn product_drafts(records: Vec<CleanRecord>) -> StageOutput<ProductDraft> {
    collect(records, "product", |record| {
        Ok(ProductDraft {
            origin: record.origin().clone(),
            product_id: text(record, "product_id")?,
            product_name: text(record, "product_name")?,
            category: text(record, "category")?,
            price: amount(record, "price")?,
            stock_quantity: count(record, "stock_quantity")?,
        })
    })
}

/// Sales lines additionally need a positive quantity and a transaction date.
pub fn sales_lines(records: Vec<CleanRecord>) -> StageOutput<SalesLine> {
    collect(records, "sales line", |record| {
        let quantity = count(record, "quantity")?;
        if quantity == 0 {
            return Err(invalid(record, "quantity", "non-positive quantity"));
        }
        let transaction_date = date(record, "transaction_date")?
            .ok_or_else(|| invalid(record, "transaction_date", "missing date"))?;
        Ok(SalesLine {
            origin: record.origin().clone(),
            transaction_id: text(record, "transaction_id")?,
            customer_id: text(record, "customer_id")?,
            product_id: text(record, "product_id")?,
            quantity,
            unit_price: amount(record, "unit_price")?,
            transaction_date,
            status: text(record, "status")?,
        })
    })
}
