/// Minimum national number length.
const NATIONAL_DIGITS: usize = 10;

/// Normalize a phone number to `+CC-NNNNNNNNNN`.
///
/// Only digits survive, plus a leading `+` marking an explicit country code.
/// Without that marker, leading trunk zeros are dropped. The last ten digits
/// are the national number; one to three digits before them are the country
/// code, and `default_country_code` is used when there are none.
///
/// Returns `None` when fewer than ten digits remain, the country code part
/// is longer than three digits, or a leading `+` is followed by no country
/// code at all.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let explicit_code = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let digits = if explicit_code {
        digits.as_str()
    } else {
        digits.trim_start_matches('0')
    };
    if digits.len() < NATIONAL_DIGITS {
        return None;
    }
    let (code, national) = digits.split_at(digits.len() - NATIONAL_DIGITS);
    let code = match code.len() {
        0 if explicit_code => return None,
        0 => default_country_code.to_string(),
        1..=3 => format!("+{code}"),
        _ => return None,
    };
    Some(format!("{code}-{national}"))
}
