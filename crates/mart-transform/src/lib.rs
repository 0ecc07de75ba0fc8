//! Record cleaning stages for the retail pipeline.
//!
//! - [`dedupe`]: first-occurrence-wins deduplication by natural key
//! - [`missing`]: per-field missing-value policies
//! - [`standardize`]: phone, category, date and city normalization
//! - [`typing`]: typed drafts from standardized records
//! - [`sales`]: order and order-item drafts from sales lines
//! - [`keys`]: surrogate key assignment

pub mod dedupe;
pub mod keys;
pub mod missing;
pub mod normalization;
pub mod sales;
pub mod standardize;
pub mod typing;

pub use dedupe::{Deduplicator, NaturalKeyRule, dedupe};
pub use keys::{KeyAssignment, KeyMap, SurrogateKeyAssigner};
pub use missing::{FieldResolution, MissingValueResolver, resolve_absent};
pub use sales::{SalesSplit, line_id, split_sales};
pub use standardize::{FieldClass, Standardizer};
pub use typing::{customer_drafts, product_drafts, sales_lines};
