//! Campaign pipeline: input validation, the three stages, and orchestration.
//!
//! - [`validator`] — structural contracts for requests and results
//! - [`research`], [`copy`], [`qa`] — the sequential stages
//! - [`pipeline`] — state machine, global deadline, progress reporting
//! - [`schema`] — form description of the request fields

pub mod copy;
pub mod pipeline;
pub mod qa;
pub mod research;
pub mod schema;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{Pipeline, PipelineConfig, PipelineState, ProgressReporter, SilentProgress};
pub use research::ResearchSettings;
pub use schema::{InputField, input_schema};
pub use validator::{validate_input, validate_output};
