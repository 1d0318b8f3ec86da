//! Search-provider boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// One search result considered for prompt injection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Extracted text of the result.
    pub text: String,
    /// URL the result was retrieved from.
    pub url: String,
}

impl SearchHit {
    /// Creates a search hit.
    #[must_use]
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Trait implemented by search collaborators.
///
/// Hits are returned most relevant first; downstream budgeting depends on
/// that ordering and never re-ranks.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs the query, returning at most `limit` relevance-ranked hits.
    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchHit>>;
}
