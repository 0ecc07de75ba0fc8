//! Value-level normalization helpers.
//!
//! Each function takes a single raw value and returns its canonical form, or
//! `None` when the value cannot be interpreted.

mod category;
mod datetime;
mod numeric;
mod phone;

pub use category::{normalize_category, title_case};
pub use datetime::{format_iso_date, parse_date};
pub use numeric::{parse_count, parse_decimal};
pub use phone::normalize_phone;
