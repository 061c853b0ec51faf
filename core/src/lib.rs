pub mod export;
pub mod markers;
pub mod pipeline;
pub mod record;
pub mod services;
pub mod source;

pub use pipeline::{Outcome, Pipeline, PipelineError, PipelineStats};
