//! Library side of the `mart-etl` binary: configuration loading, logging
//! setup and the staged pipeline.

pub mod config;
pub mod logging;
pub mod pipeline;

pub use pipeline::{
    CancelToken, Pipeline, PipelineError, PipelineFailure, RowStream, RunOutcome, Source, Sources,
};
