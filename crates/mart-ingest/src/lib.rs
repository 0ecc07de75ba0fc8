//! Raw retail source ingestion.
//!
//! Turns the customers, products and sales CSV files of a data directory
//! into lazy streams of [`RawRecord`](mart_model::RawRecord) values.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use mart_ingest::{discover_sources, open_source};
//! use mart_model::SourceKind;
//!
//! let sources = discover_sources(Path::new("data"))?;
//! for row in open_source(SourceKind::Customers, &sources.customers)? {
//!     let row = row?;
//!     println!("{:?}", row.get("customer_id"));
//! }
//! ```

mod reader;
mod discovery;
mod error;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use reader::{RecordStream, open_source};

// === File Discovery ===
pub use discovery::{SourcePaths, discover_sources, list_csv_files};
