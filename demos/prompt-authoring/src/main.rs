//! Walkthrough of the prompt-authoring engine: declaration parsing, value
//! substitution, and a budget-aware execution with canned collaborators.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use prompt_adapters::completion::{CompletionProvider, CompletionRequest, ModelConfig};
use prompt_adapters::error::ProviderResult;
use prompt_adapters::search::{SearchHit, SearchProvider};
use prompt_engine::{SubstitutionMap, parse_parameters, substitute};
use prompt_pipeline::{ExecutionRequest, ExecutorConfig, PromptExecutor};

const TEMPLATE: &str = "Summarise {{ topic }} for a \
{{ audience | select : novice, expert }} reader. \
Mention changes since {{ since | year-last-3 }}.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== promptdeck: prompt authoring walkthrough ===\n");

    let values = demonstrate_parsing()?;
    let resolved = demonstrate_substitution(&values);
    demonstrate_execution(resolved).await?;

    Ok(())
}

fn demonstrate_parsing() -> Result<SubstitutionMap> {
    println!("--- 1: parameter declarations ---\n");

    let declarations = parse_parameters(TEMPLATE)?;
    for declaration in &declarations {
        print!("  {} ({})", declaration.name, declaration.kind);
        if let Some(options) = declaration.effective_options() {
            print!(" options: {}", options.join(" / "));
        }
        if let (Some(past), Some(future)) = (declaration.past_years, declaration.future_years) {
            print!(" year range: -{past}..+{future}");
        }
        println!();
    }
    println!();

    // Values a parameter form would have collected.
    let mut values = SubstitutionMap::new();
    values.insert("topic".to_owned(), "borrow checking".to_owned());
    values.insert("audience".to_owned(), "novice".to_owned());
    values.insert("since".to_owned(), "2024".to_owned());
    Ok(values)
}

fn demonstrate_substitution(values: &SubstitutionMap) -> String {
    println!("--- 2: substitution ---\n");
    let resolved = substitute(TEMPLATE, values);
    println!("  {resolved}\n");
    resolved
}

async fn demonstrate_execution(resolved: String) -> Result<()> {
    println!("--- 3: budget-aware execution ---\n");

    let executor = PromptExecutor::new(
        Arc::new(CannedCompletion),
        ExecutorConfig::default().with_snippet_counts(1, 2),
    )
    .with_search(Arc::new(StaticDocs));

    let report = executor
        .execute(
            ExecutionRequest::new(resolved, ModelConfig::new("demo-model"))
                .with_system_prompt("Answer in two sentences."),
        )
        .await?;

    println!("  outcome:      {:?}", report.outcome);
    println!("  augmentation: {:?}", report.augmentation);
    println!("  output:       {}", report.output);
    Ok(())
}

/// Completion stand-in answering every request with canned text.
struct CannedCompletion;

#[async_trait]
impl CompletionProvider for CannedCompletion {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: CompletionRequest) -> ProviderResult<String> {
        // The condenser call carries its own system instruction; everything
        // else is the final prompt.
        if request.system_prompt().is_some_and(|s| s.contains("search query")) {
            return Ok("borrow checker changes".to_owned());
        }
        Ok("The borrow checker verifies ownership at compile time. \
            Recent releases relaxed several spurious borrow errors."
            .to_owned())
    }
}

/// Search stand-in returning a fixed set of documentation snippets.
struct StaticDocs;

#[async_trait]
impl SearchProvider for StaticDocs {
    async fn search(&self, _query: &str, limit: usize) -> ProviderResult<Vec<SearchHit>> {
        let hits = vec![
            SearchHit::new(
                "Every value has a single owner; moves transfer ownership.",
                "https://docs.example/ownership",
            ),
            SearchHit::new(
                "Borrow checking rejects aliasing mutable references.",
                "https://docs.example/borrowing",
            ),
            SearchHit::new(
                "Non-lexical lifetimes shortened borrow regions.",
                "https://docs.example/nll",
            ),
        ];
        Ok(hits.into_iter().take(limit).collect())
    }
}
