//! Context budgeting for externally fetched snippets.
//!
//! Given a model's context window, the allocator reserves a share for the
//! response, measures what the prompt already consumes, and greedily admits
//! relevance-ranked snippets into whatever remains.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tokens::estimate_tokens;

/// Percentage of the context window reserved for the model's own response
/// and call overhead.
pub const RESPONSE_RESERVE_PERCENT: usize = 25;

/// Minimum leftover budget, in tokens, required before snippet injection is
/// attempted at all.
pub const ACTIVATION_THRESHOLD_TOKENS: usize = 100;

/// Separator placed between an injected context block and the original
/// system prompt.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Tunable policy for context budgeting.
#[derive(Clone, Copy, Debug)]
pub struct BudgetPolicy {
    /// Percentage of the ceiling set aside for the response, rounded down.
    pub reserve_percent: usize,
    /// Minimum available tokens required before any snippet is admitted.
    pub activation_threshold: usize,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            reserve_percent: RESPONSE_RESERVE_PERCENT,
            activation_threshold: ACTIVATION_THRESHOLD_TOKENS,
        }
    }
}

/// Token arithmetic for one prompt-execution attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPlan {
    /// The model's context window, in tokens.
    pub total_ceiling: usize,
    /// Tokens set aside for the model's own response and call overhead.
    pub reserved: usize,
    /// Estimated tokens already consumed by the prompt and system text.
    pub base_usage: usize,
}

impl BudgetPlan {
    /// Computes the plan for the supplied prompt and system text.
    #[must_use]
    pub fn compute(
        policy: &BudgetPolicy,
        ceiling: usize,
        prompt_text: &str,
        system_text: &str,
    ) -> Self {
        Self {
            total_ceiling: ceiling,
            reserved: ceiling * policy.reserve_percent / 100,
            base_usage: estimate_tokens(prompt_text) + estimate_tokens(system_text),
        }
    }

    /// Tokens left for injected context. Negative when the base prompt
    /// already exceeds the usable window.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn available(&self) -> i64 {
        self.total_ceiling as i64 - self.reserved as i64 - self.base_usage as i64
    }

    /// Whether the leftover budget clears the activation threshold.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn permits_injection(&self, policy: &BudgetPolicy) -> bool {
        self.available() > policy.activation_threshold as i64
    }
}

/// One candidate piece of external context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Snippet text as returned by the search collaborator.
    pub text: String,
    /// URL the snippet was sourced from.
    pub source_url: String,
}

impl Snippet {
    /// Creates a snippet.
    #[must_use]
    pub fn new(text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_url: source_url.into(),
        }
    }

    /// Renders the numbered source block this snippet contributes to the
    /// injected context. The allocator costs exactly this rendering.
    #[must_use]
    pub fn render_block(&self, number: usize) -> String {
        format!("[{number}] Source: {}\n{}\n\n", self.source_url, self.text)
    }
}

/// Snippets accepted by one allocation pass, in their original relevance
/// order, plus the cumulative token cost they consume.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Accepted snippets, most relevant first.
    pub snippets: Vec<Snippet>,
    /// Cumulative estimated cost of the rendered blocks.
    pub consumed_tokens: usize,
}

impl SelectionResult {
    /// True when nothing was admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Renders the injected context block, or `None` when empty.
    #[must_use]
    pub fn context_block(&self) -> Option<String> {
        if self.snippets.is_empty() {
            return None;
        }
        let mut block = String::new();
        for (idx, snippet) in self.snippets.iter().enumerate() {
            block.push_str(&snippet.render_block(idx + 1));
        }
        Some(block.trim_end().to_owned())
    }
}

/// Greedy, order-preserving snippet selection under a hard token budget.
///
/// Candidates arrive relevance-ranked, so the allocator admits them in
/// order with a hard per-item test instead of repacking: the selection is
/// always "the first N that fit", which keeps results deterministic and
/// explainable at the cost of occasionally leaving budget unused.
#[derive(Clone, Debug, Default)]
pub struct ContextAllocator {
    policy: BudgetPolicy,
}

impl ContextAllocator {
    /// Creates an allocator with the supplied policy.
    #[must_use]
    pub fn new(policy: BudgetPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in force.
    #[must_use]
    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// Selects as many candidates as fit under the ceiling.
    ///
    /// `max_count` is a hard stop regardless of remaining budget.
    /// `min_count` is advisory only: a selection that comes up short is
    /// returned as-is rather than overrunning the window, since the
    /// admission test never relaxes.
    #[must_use]
    pub fn allocate(
        &self,
        ceiling: usize,
        prompt_text: &str,
        system_text: &str,
        candidates: &[Snippet],
        min_count: usize,
        max_count: usize,
    ) -> SelectionResult {
        let plan = BudgetPlan::compute(&self.policy, ceiling, prompt_text, system_text);
        if !plan.permits_injection(&self.policy) {
            debug!(
                available = plan.available(),
                threshold = self.policy.activation_threshold,
                "budget below activation threshold; skipping injection"
            );
            return SelectionResult::default();
        }
        let available = usize::try_from(plan.available()).unwrap_or(0);

        let mut selection = SelectionResult::default();
        for candidate in candidates {
            if selection.snippets.len() >= max_count {
                break;
            }
            let block = candidate.render_block(selection.snippets.len() + 1);
            let cost = estimate_tokens(&block);
            if selection.consumed_tokens + cost <= available {
                selection.consumed_tokens += cost;
                selection.snippets.push(candidate.clone());
            }
        }

        if selection.snippets.len() < min_count {
            debug!(
                accepted = selection.snippets.len(),
                min_count, "selection fell short of the advisory minimum"
            );
        }
        selection
    }
}
