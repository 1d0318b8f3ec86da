//! Asynchronous prompt execution pipeline.
//!
//! Wires the pure engine components to the collaborator boundaries: parse
//! the template, substitute the caller's values, optionally augment the
//! prompt with budget-checked search snippets, then make the final
//! completion call. Augmentation is best-effort throughout; only a
//! malformed template stops an execution.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod executor;

/// Pipeline error type and result alias.
pub use error::{PipelineError, PipelineResult};
/// Executor, its configuration, and execution reports.
pub use executor::{
    AugmentationStatus, ExecutionOutcome, ExecutionReport, ExecutionRequest, ExecutorConfig,
    PromptExecutor,
};
