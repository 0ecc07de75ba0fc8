//! Data quality reporting.
//!
//! A [`QualityAccumulator`] is fed issues and terminal transitions while the
//! pipeline runs and is finalized once into a [`QualityReport`].

mod accumulator;
mod report;

pub use accumulator::QualityAccumulator;
pub use report::{FileQuality, QualityReport};
