//! Shared fixtures for `memory-core`, the storage backend crates, and
//! `memory-server` integration tests (§4.8.4): a one-call in-memory
//! [`Orchestrator`] builder wired to the mock clients and in-memory
//! [`VectorStore`]/[`MemoryCache`] that `memory-core` itself already
//! defines for its own unit tests.
//!
//! Kept deliberately thin: the mocks live in `memory-core` so that crate
//! can test itself without depending on `test-utils`; this crate just
//! re-exports them under stable names and adds the cross-crate wiring.

use memory_core::cache::mock::InMemoryCache;
use memory_core::completion::MockCompletionClient;
use memory_core::embeddings::MockEmbeddingClient;
use memory_core::events::EventStream;
use memory_core::storage::mock::InMemoryVectorStore;
use memory_core::Orchestrator;
use std::sync::Arc;

pub use memory_core::cache::mock::InMemoryCache as MockCache;
pub use memory_core::completion::MockCompletionClient as MockCompletion;
pub use memory_core::embeddings::MockEmbeddingClient as MockEmbedding;
pub use memory_core::storage::mock::InMemoryVectorStore as MockStore;

/// Build an [`Orchestrator`] wired entirely to in-memory/mock backends, at
/// the given embedding dimension.
///
/// Used across `memory-core`'s own integration tests and the storage
/// backend crates' cross-crate tests so none of them hand-roll the wiring
/// independently.
#[must_use]
pub fn in_memory_orchestrator(dimension: usize) -> Orchestrator {
    Orchestrator::new(
        Arc::new(InMemoryVectorStore::default()),
        Arc::new(MockEmbeddingClient::new(dimension)),
        Arc::new(MockCompletionClient),
        Arc::new(InMemoryCache::default()),
        Arc::new(EventStream::new()),
    )
}

/// An [`EmbeddingClient`][memory_core::EmbeddingClient] whose dimension can
/// be swapped at runtime, used to exercise the dimension-migration
/// scenario (§4.4 step 1, §8 scenario 4): the table is re-created and
/// pre-existing rows are dropped the first time a retrieval observes a new
/// dimension.
pub struct SwitchableEmbeddingClient {
    inner: parking_lot::Mutex<MockEmbeddingClient>,
}

impl SwitchableEmbeddingClient {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: parking_lot::Mutex::new(MockEmbeddingClient::new(dimension)),
        }
    }

    /// Switch the active model to a new dimension, simulating an operator
    /// changing `DEFAULT_EMBEDDING_MODEL` to a model with a different
    /// output width.
    pub fn switch_dimension(&self, dimension: usize) {
        *self.inner.lock() = MockEmbeddingClient::new(dimension);
    }
}

#[async_trait::async_trait]
impl memory_core::EmbeddingClient for SwitchableEmbeddingClient {
    async fn embed(&self, text: &str) -> memory_core::Result<memory_core::embeddings::EmbeddingResult> {
        let client = MockEmbeddingClient::new(self.inner.lock().dimension());
        client.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.inner.lock().dimension()
    }

    fn model_name(&self) -> &str {
        "switchable-mock-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::orchestrator::StoreMemoryRequest;

    #[tokio::test]
    async fn in_memory_orchestrator_round_trips_a_store() {
        let orch = in_memory_orchestrator(16);
        let result = orch
            .store_memory(StoreMemoryRequest {
                user_id: "u1".to_string(),
                session_id: Some("s1".to_string()),
                content: "제 이름은 김철수입니다.".to_string(),
                type_path: None,
                metadata: Default::default(),
            })
            .await
            .unwrap();
        assert!(result.stored);
    }

    #[tokio::test]
    async fn switchable_embedding_client_changes_dimension() {
        let client = SwitchableEmbeddingClient::new(8);
        assert_eq!(client.dimension(), 8);
        client.switch_dimension(16);
        assert_eq!(client.dimension(), 16);
        use memory_core::EmbeddingClient;
        let result = client.embed("hello").await.unwrap();
        assert_eq!(result.dimension, 16);
    }
}
