use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prompt_adapters::completion::{CompletionProvider, CompletionRequest, ModelConfig};
use prompt_adapters::error::{ProviderError, ProviderResult};
use prompt_adapters::search::{SearchHit, SearchProvider};
use prompt_engine::CONTEXT_DELIMITER;
use prompt_pipeline::{
    AugmentationStatus, ExecutionOutcome, ExecutionRequest, ExecutorConfig, PipelineError,
    PromptExecutor,
};

struct RecordingCompletion {
    fail_first: bool,
    fail_all: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingCompletion {
    fn new() -> Self {
        Self {
            fail_first: false,
            fail_all: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    fn failing_condenser() -> Self {
        Self {
            fail_first: true,
            ..Self::new()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> CompletionRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("at least one completion call")
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: CompletionRequest) -> ProviderResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.fail_all || (self.fail_first && call == 0) {
            return Err(ProviderError::transport("backend unreachable"));
        }
        Ok(format!("answer {}", call + 1))
    }
}

struct StaticSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_owned());
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

struct FailingSearch {
    calls: AtomicUsize,
}

impl FailingSearch {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str, _limit: usize) -> ProviderResult<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::transport("search endpoint down"))
    }
}

fn docs_hits() -> Vec<SearchHit> {
    vec![
        SearchHit::new("Ownership moves values.", "https://docs.example/one"),
        SearchHit::new("Borrows never outlive owners.", "https://docs.example/two"),
    ]
}

#[tokio::test]
async fn template_error_blocks_execution_before_any_call() {
    let completion = Arc::new(RecordingCompletion::new());
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default());

    let err = executor
        .execute(ExecutionRequest::new("{{a{{b}}c}}", ModelConfig::new("m")))
        .await
        .expect_err("nested template must abort");

    assert!(matches!(err, PipelineError::Template { .. }));
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn plain_execution_substitutes_and_passes_system_prompt() {
    let completion = Arc::new(RecordingCompletion::new());
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default());

    let report = executor
        .execute(
            ExecutionRequest::new("{{greeting}}, world", ModelConfig::new("m"))
                .with_system_prompt("be brief")
                .with_value("greeting", "Hello"),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Completed);
    assert_eq!(report.output, "answer 1");
    assert_eq!(report.augmentation, AugmentationStatus::Disabled);

    let request = completion.last_request();
    assert_eq!(request.system_prompt(), Some("be brief"));
    assert_eq!(request.messages()[0].content(), "Hello, world");
}

#[tokio::test]
async fn augmented_execution_injects_numbered_context_block() {
    let completion = Arc::new(RecordingCompletion::new());
    let search = Arc::new(StaticSearch::with_hits(docs_hits()));
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default())
        .with_search(search.clone());

    let report = executor
        .execute(
            ExecutionRequest::new("Explain {{topic}}", ModelConfig::new("m"))
                .with_system_prompt("ground rules")
                .with_value("topic", "ownership"),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Completed);
    match report.augmentation {
        AugmentationStatus::Injected { count, tokens } => {
            assert_eq!(count, 2);
            assert!(tokens > 0);
        }
        other => panic!("expected injection, got {other:?}"),
    }

    // The condensed query (the first completion answer) drove the search.
    assert_eq!(search.queries(), vec!["answer 1".to_owned()]);
    assert_eq!(completion.call_count(), 2);

    let request = completion.last_request();
    let system = request.system_prompt().expect("system text present");
    assert!(system.contains("[1] Source: https://docs.example/one"));
    assert!(system.contains("[2] Source: https://docs.example/two"));
    assert!(system.ends_with(&format!("{CONTEXT_DELIMITER}ground rules")));
    assert_eq!(request.messages()[0].content(), "Explain ownership");
}

#[tokio::test]
async fn search_failure_degrades_to_no_augmentation() {
    let completion = Arc::new(RecordingCompletion::new());
    let search = Arc::new(FailingSearch::new());
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default())
        .with_search(search.clone());

    let report = executor
        .execute(
            ExecutionRequest::new("plain prompt", ModelConfig::new("m"))
                .with_system_prompt("sys"),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Completed);
    match &report.augmentation {
        AugmentationStatus::Skipped { reason } => assert!(reason.contains("search failed")),
        other => panic!("expected skip, got {other:?}"),
    }

    // One search attempt, never retried; the final prompt is untouched.
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(completion.last_request().system_prompt(), Some("sys"));
}

#[tokio::test]
async fn condense_failure_falls_back_to_raw_prompt_query() {
    let completion = Arc::new(RecordingCompletion::failing_condenser());
    let search = Arc::new(StaticSearch::with_hits(docs_hits()));
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default())
        .with_search(search.clone());

    let report = executor
        .execute(
            ExecutionRequest::new("{{q}} in five words", ModelConfig::new("m"))
                .with_value("q", "lifetimes"),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::Completed);
    assert_eq!(search.queries(), vec!["lifetimes in five words".to_owned()]);
    assert!(matches!(
        report.augmentation,
        AugmentationStatus::Injected { count: 2, .. }
    ));
}

#[tokio::test]
async fn empty_search_results_skip_augmentation() {
    let completion = Arc::new(RecordingCompletion::new());
    let search = Arc::new(StaticSearch::with_hits(Vec::new()));
    let executor =
        PromptExecutor::new(completion.clone(), ExecutorConfig::default()).with_search(search);

    let report = executor
        .execute(ExecutionRequest::new("prompt", ModelConfig::new("m")))
        .await
        .unwrap();

    assert!(matches!(
        report.augmentation,
        AugmentationStatus::Skipped { .. }
    ));
    assert_eq!(report.outcome, ExecutionOutcome::Completed);
}

#[tokio::test]
async fn provider_failure_surfaces_as_visible_output() {
    let completion = Arc::new(RecordingCompletion::failing());
    let executor = PromptExecutor::new(completion.clone(), ExecutorConfig::default());

    let report = executor
        .execute(ExecutionRequest::new("prompt", ModelConfig::new("m")))
        .await
        .unwrap();

    assert_eq!(report.outcome, ExecutionOutcome::ProviderFailed);
    assert!(report.output.contains("backend unreachable"));
    // Exactly one attempt: provider failures are surfaced, not retried.
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn starved_budget_skips_the_search_round_trip() {
    let completion = Arc::new(RecordingCompletion::new());
    let search = Arc::new(StaticSearch::with_hits(docs_hits()));
    let executor = PromptExecutor::new(
        completion.clone(),
        ExecutorConfig::default().with_context_ceiling(100),
    )
    .with_search(search.clone());

    let report = executor
        .execute(ExecutionRequest::new("prompt", ModelConfig::new("m")))
        .await
        .unwrap();

    match &report.augmentation {
        AugmentationStatus::Skipped { reason } => {
            assert!(reason.contains("activation threshold"));
        }
        other => panic!("expected skip, got {other:?}"),
    }
    // Neither the condenser nor the search ran.
    assert_eq!(search.call_count(), 0);
    assert_eq!(completion.call_count(), 1);
}
