//! Prompt-authoring engine facade.
//!
//! Depend on this crate via `cargo add promptdeck`. It bundles the
//! workspace crates behind feature flags so downstream users can enable or
//! disable components as needed for their tooling.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export the pure template/budgeting engine for convenience.
pub use prompt_engine as engine;

/// Collaborator boundaries (enabled by the `adapters` feature).
#[cfg(feature = "adapters")]
pub use prompt_adapters as adapters;

/// Execution pipeline (enabled by the `pipeline` feature).
#[cfg(feature = "pipeline")]
pub use prompt_pipeline as pipeline;
