//! Key-value persistence for completed summarization results.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::processing::SummarizationResult;

/// Errors surfaced by a result store.
///
/// The in-memory adapter never fails; the variant exists for adapters over external storage
/// (databases, key-value services) plugged in through [`ResultStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing storage could not complete the operation.
    #[error("Result store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for results, keyed by document identifier.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace the result stored under `id`.
    async fn save(&self, id: &str, result: &SummarizationResult) -> Result<(), StoreError>;

    /// Fetch the result stored under `id`.
    async fn get(&self, id: &str) -> Result<Option<SummarizationResult>, StoreError>;

    /// Remove the result stored under `id`, reporting whether one existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    entries: RwLock<HashMap<String, SummarizationResult>>,
}

impl InMemoryResultStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no results.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save(&self, id: &str, result: &SummarizationResult) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), result.clone());
        tracing::debug!(id, "Stored summarization result");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SummarizationResult>, StoreError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(id).is_some())
    }
}
