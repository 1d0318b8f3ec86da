//! Prompt-store boundary.
//!
//! Stored prompts are named text files with front-matter style metadata.
//! The real store lives outside this workspace (filesystem, Gist, ...);
//! [`MemoryPromptStore`] is an in-process implementation for tests and
//! demos.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ProviderError, ProviderResult};

/// One stored prompt: name, front-matter metadata, and body text.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoredPrompt {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    content: String,
}

impl StoredPrompt {
    /// Creates a stored prompt with empty metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: BTreeMap::new(),
            content: content.into(),
        }
    }

    /// Adds one front-matter entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the prompt name (a slash-separated path).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the front-matter metadata.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Returns the prompt body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }
}

/// Trait implemented by prompt stores.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Loads a prompt by name.
    async fn load(&self, name: &str) -> ProviderResult<StoredPrompt>;

    /// Lists all prompt names, sorted.
    async fn list(&self) -> ProviderResult<Vec<String>>;

    /// Creates or replaces a prompt.
    async fn save(&self, prompt: StoredPrompt) -> ProviderResult<()>;

    /// Deletes a prompt by name.
    async fn delete(&self, name: &str) -> ProviderResult<()>;

    /// Moves a prompt to a new name.
    async fn rename(&self, from: &str, to: &str) -> ProviderResult<()>;

    /// Creates an empty folder.
    async fn create_folder(&self, path: &str) -> ProviderResult<()>;
}

/// In-memory prompt store retaining everything for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryPromptStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    prompts: BTreeMap<String, StoredPrompt>,
    folders: BTreeSet<String>,
}

impl MemoryPromptStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn load(&self, name: &str) -> ProviderResult<StoredPrompt> {
        let guard = self.inner.read().await;
        guard
            .prompts
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(name))
    }

    async fn list(&self) -> ProviderResult<Vec<String>> {
        let guard = self.inner.read().await;
        Ok(guard.prompts.keys().cloned().collect())
    }

    async fn save(&self, prompt: StoredPrompt) -> ProviderResult<()> {
        let mut guard = self.inner.write().await;
        guard.prompts.insert(prompt.name().to_owned(), prompt);
        Ok(())
    }

    async fn delete(&self, name: &str) -> ProviderResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .prompts
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found(name))
    }

    async fn rename(&self, from: &str, to: &str) -> ProviderResult<()> {
        let mut guard = self.inner.write().await;
        if guard.prompts.contains_key(to) {
            return Err(ProviderError::invalid_request(format!(
                "destination already exists: {to}"
            )));
        }
        let prompt = guard
            .prompts
            .remove(from)
            .ok_or_else(|| ProviderError::not_found(from))?;
        guard.prompts.insert(to.to_owned(), prompt.renamed(to));
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> ProviderResult<()> {
        let mut guard = self.inner.write().await;
        guard.folders.insert(path.to_owned());
        Ok(())
    }
}
