//! Template grammar, value substitution, and context budgeting for
//! prompt-authoring tools.
//!
//! Every function and type in this crate is pure and synchronous: each call
//! operates on its own inputs and returns a fresh value, so the APIs can be
//! used from concurrent requests without coordination.

#![warn(missing_docs, clippy::pedantic)]

mod budget;
mod substitute;
mod template;
mod tokens;

/// Snippet budgeting under a hard token ceiling.
pub use budget::{
    ACTIVATION_THRESHOLD_TOKENS, BudgetPlan, BudgetPolicy, CONTEXT_DELIMITER, ContextAllocator,
    RESPONSE_RESERVE_PERCENT, SelectionResult, Snippet,
};
/// Placeholder replacement over template text.
pub use substitute::{SubstitutionMap, substitute};
/// Placeholder grammar parsing and declaration types.
pub use template::{
    ParameterDeclaration, ParameterKind, TemplateError, TemplateResult, parse_parameters,
};
/// Approximate token counting.
pub use tokens::{CHARS_PER_TOKEN, estimate_tokens};
