use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Parse a decimal amount, tolerating thousands separators.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse a non-negative whole count; `"12.0"` is accepted, `"12.5"` is not.
pub fn parse_count(raw: &str) -> Option<u32> {
    let value = parse_decimal(raw)?;
    if value.is_sign_negative() || !value.fract().is_zero() {
        return None;
    }
    value.to_u32()
}
