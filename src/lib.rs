pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod infra;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod transform;
pub mod types;

pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, PipelineReport, PipelineStage};
