//! Error definitions for the execution pipeline.

use prompt_engine::TemplateError;
use thiserror::Error;

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that stop a prompt execution before any network call.
///
/// Failures past the template stage degrade or surface inside the
/// execution report instead; see the executor documentation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The template failed validation; execution must not proceed.
    #[error("template validation failed: {source}")]
    Template {
        /// Underlying template error, naming the offending spans.
        #[from]
        source: TemplateError,
    },
}
