//! Loading canonical retail entities into an FK-enforcing store.
//!
//! The [`ReferentialLoader`] keys drafts, resolves their parents, and writes
//! them through any [`Storage`]; [`InMemoryStore`] is the bundled store.

pub mod error;
pub mod export;
pub mod loader;
pub mod storage;

pub use error::{LoadError, Result};
pub use export::export_tables;
pub use loader::{LoadCandidate, Loaded, Reference, ReferentialLoader, RetryPolicy};
pub use storage::{InMemoryStore, InsertOutcome, Storage};
