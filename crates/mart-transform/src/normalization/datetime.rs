use chrono::{NaiveDate, NaiveDateTime};

/// Timestamp layouts accepted when no date-only format matches; only the
/// date part is kept.
const DATETIME_FALLBACKS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date against `formats` in order; the first match wins.
pub fn parse_date<S: AsRef<str>>(raw: &str, formats: &[S]) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format.as_ref()).ok())
        .or_else(|| {
            DATETIME_FALLBACKS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Canonical `YYYY-MM-DD` rendering.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
