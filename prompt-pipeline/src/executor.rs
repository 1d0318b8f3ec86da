//! Prompt execution: substitution, augmentation, and the completion call.

use std::sync::Arc;

use prompt_adapters::completion::{
    ChatMessage, CompletionProvider, CompletionRequest, MessageRole, ModelConfig,
};
use prompt_adapters::search::SearchProvider;
use prompt_engine::{
    BudgetPlan, BudgetPolicy, CONTEXT_DELIMITER, ContextAllocator, Snippet, SubstitutionMap,
    parse_parameters, substitute,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PipelineResult;

/// Instruction used for the auxiliary query-condensation call.
const CONDENSE_INSTRUCTION: &str = "Extract a short web search query (a few keywords) \
     from the prompt that follows. Reply with the query text only.";

/// Configuration for a [`PromptExecutor`].
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    context_ceiling: usize,
    policy: BudgetPolicy,
    min_snippets: usize,
    max_snippets: usize,
    search_limit: usize,
    augmentation: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            context_ceiling: 8192,
            policy: BudgetPolicy::default(),
            min_snippets: 1,
            max_snippets: 3,
            search_limit: 8,
            augmentation: true,
        }
    }
}

impl ExecutorConfig {
    /// Sets the model context window, in tokens.
    #[must_use]
    pub fn with_context_ceiling(mut self, tokens: usize) -> Self {
        self.context_ceiling = tokens;
        self
    }

    /// Overrides the budgeting policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BudgetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the advisory minimum and hard maximum snippet counts.
    #[must_use]
    pub fn with_snippet_counts(mut self, min: usize, max: usize) -> Self {
        self.min_snippets = min;
        self.max_snippets = max;
        self
    }

    /// Sets how many candidates to request from the search collaborator.
    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Enables or disables search augmentation.
    #[must_use]
    pub fn with_augmentation(mut self, enabled: bool) -> Self {
        self.augmentation = enabled;
        self
    }
}

/// One prompt execution request.
#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    template: String,
    system_prompt: Option<String>,
    values: SubstitutionMap,
    model: ModelConfig,
}

impl ExecutionRequest {
    /// Creates a request for the supplied template and model.
    #[must_use]
    pub fn new(template: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            template: template.into(),
            system_prompt: None,
            values: SubstitutionMap::new(),
            model,
        }
    }

    /// Sets the system prompt accompanying the template.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Adds one parameter value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Replaces the whole value map.
    #[must_use]
    pub fn with_values(mut self, values: SubstitutionMap) -> Self {
        self.values = values;
        self
    }
}

/// How an execution finished.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The completion provider answered normally.
    Completed,
    /// The provider failed; the report's output carries the error text,
    /// since results and errors share one display surface.
    ProviderFailed,
}

/// What happened to search augmentation during one execution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AugmentationStatus {
    /// Augmentation was switched off or no search collaborator is attached.
    Disabled,
    /// Augmentation was attempted but degraded to a no-op.
    Skipped {
        /// Why nothing was injected.
        reason: String,
    },
    /// Snippets were injected into the system text.
    Injected {
        /// Number of snippets accepted.
        count: usize,
        /// Estimated tokens consumed by the injected block.
        tokens: usize,
    },
}

/// Result of one prompt execution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Identifier correlating this execution across log lines.
    pub execution_id: Uuid,
    /// Visible result text: the completion, or the provider's error text.
    pub output: String,
    /// How the execution finished.
    pub outcome: ExecutionOutcome,
    /// What happened to search augmentation.
    pub augmentation: AugmentationStatus,
}

/// Drives one prompt from template text to completion output.
///
/// Template validation failures abort before any network traffic. The
/// augmentation steps are best-effort: a failed condensation falls back to
/// the raw prompt as the query, a failed search skips augmentation
/// entirely, and neither is retried so the primary request is never
/// delayed. The final completion call runs exactly once.
pub struct PromptExecutor {
    completion: Arc<dyn CompletionProvider>,
    search: Option<Arc<dyn SearchProvider>>,
    allocator: ContextAllocator,
    config: ExecutorConfig,
}

impl PromptExecutor {
    /// Creates an executor over the supplied completion collaborator.
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionProvider>, config: ExecutorConfig) -> Self {
        Self {
            completion,
            search: None,
            allocator: ContextAllocator::new(config.policy),
            config,
        }
    }

    /// Attaches a search collaborator for prompt augmentation.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Executes one prompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::Template`] when the template fails
    /// validation; no substitution or network call happens in that case.
    /// Completion-provider failures do NOT error: they surface through the
    /// report's output and outcome.
    pub async fn execute(&self, request: ExecutionRequest) -> PipelineResult<ExecutionReport> {
        let execution_id = Uuid::new_v4();

        let declarations = parse_parameters(&request.template)?;
        debug!(%execution_id, declared = declarations.len(), "template parsed");

        let prompt_text = substitute(&request.template, &request.values);
        let system_prompt = request.system_prompt.clone().unwrap_or_default();

        let (augmentation, injected) = match &self.search {
            Some(search) if self.config.augmentation => {
                self.augment(
                    execution_id,
                    &prompt_text,
                    &system_prompt,
                    search.as_ref(),
                    &request.model,
                )
                .await
            }
            _ => (AugmentationStatus::Disabled, None),
        };

        let mut completion_request = CompletionRequest::new(
            request.model.clone(),
            vec![ChatMessage::new(MessageRole::User, prompt_text)],
        );
        if let Some(system_text) = compose_system_text(injected.as_deref(), &system_prompt) {
            completion_request = completion_request.with_system_prompt(system_text);
        }

        match self.completion.complete(completion_request).await {
            Ok(output) => {
                debug!(%execution_id, provider = self.completion.name(), "completion finished");
                Ok(ExecutionReport {
                    execution_id,
                    output,
                    outcome: ExecutionOutcome::Completed,
                    augmentation,
                })
            }
            Err(err) => {
                warn!(
                    %execution_id,
                    provider = self.completion.name(),
                    error = %err,
                    "completion provider failed"
                );
                Ok(ExecutionReport {
                    execution_id,
                    output: err.to_string(),
                    outcome: ExecutionOutcome::ProviderFailed,
                    augmentation,
                })
            }
        }
    }

    /// Runs the best-effort augmentation steps, returning the status and
    /// the injected context block if any snippet was admitted.
    async fn augment(
        &self,
        execution_id: Uuid,
        prompt_text: &str,
        system_prompt: &str,
        search: &dyn SearchProvider,
        model: &ModelConfig,
    ) -> (AugmentationStatus, Option<String>) {
        // The allocator applies the same activation rule; checking the plan
        // here avoids a search round-trip whose results could never be
        // admitted.
        let plan = BudgetPlan::compute(
            self.allocator.policy(),
            self.config.context_ceiling,
            prompt_text,
            system_prompt,
        );
        if !plan.permits_injection(self.allocator.policy()) {
            debug!(
                %execution_id,
                available = plan.available(),
                "budget below activation threshold; skipping augmentation"
            );
            return (
                AugmentationStatus::Skipped {
                    reason: "budget below activation threshold".to_owned(),
                },
                None,
            );
        }

        let query = self.condense_query(execution_id, prompt_text, model).await;
        let hits = match search.search(&query, self.config.search_limit).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(%execution_id, error = %err, "search failed; continuing without augmentation");
                return (
                    AugmentationStatus::Skipped {
                        reason: format!("search failed: {err}"),
                    },
                    None,
                );
            }
        };
        if hits.is_empty() {
            return (
                AugmentationStatus::Skipped {
                    reason: "search returned no results".to_owned(),
                },
                None,
            );
        }

        let candidates: Vec<Snippet> = hits
            .into_iter()
            .map(|hit| Snippet::new(hit.text, hit.url))
            .collect();
        let selection = self.allocator.allocate(
            self.config.context_ceiling,
            prompt_text,
            system_prompt,
            &candidates,
            self.config.min_snippets,
            self.config.max_snippets,
        );

        match selection.context_block() {
            Some(block) => {
                let count = selection.snippets.len();
                let tokens = selection.consumed_tokens;
                debug!(%execution_id, count, tokens, "context snippets injected");
                (AugmentationStatus::Injected { count, tokens }, Some(block))
            }
            None => (
                AugmentationStatus::Skipped {
                    reason: "no snippet fit the remaining budget".to_owned(),
                },
                None,
            ),
        }
    }

    /// Derives a condensed search query via an auxiliary completion call,
    /// falling back to the raw prompt text when the call fails or returns
    /// nothing usable.
    async fn condense_query(
        &self,
        execution_id: Uuid,
        prompt_text: &str,
        model: &ModelConfig,
    ) -> String {
        let request = CompletionRequest::new(
            model.clone(),
            vec![ChatMessage::new(MessageRole::User, prompt_text)],
        )
        .with_system_prompt(CONDENSE_INSTRUCTION);

        match self.completion.complete(request).await {
            Ok(text) if !text.trim().is_empty() => {
                let query = text.trim().to_owned();
                debug!(%execution_id, query = %query, "search query condensed");
                query
            }
            Ok(_) => {
                debug!(%execution_id, "condensed query was empty; using the raw prompt");
                prompt_text.to_owned()
            }
            Err(err) => {
                warn!(%execution_id, error = %err, "query condensation failed; using the raw prompt");
                prompt_text.to_owned()
            }
        }
    }
}

/// Assembles the final system text: the injected block and the original
/// system prompt, separated by the fixed delimiter, omitting whichever
/// half is absent.
fn compose_system_text(injected: Option<&str>, system_prompt: &str) -> Option<String> {
    match (injected, system_prompt.is_empty()) {
        (None, true) => None,
        (None, false) => Some(system_prompt.to_owned()),
        (Some(block), true) => Some(block.to_owned()),
        (Some(block), false) => Some(format!("{block}{CONTEXT_DELIMITER}{system_prompt}")),
    }
}
