//! Retrieval Engine (C4): table provisioning, embed, search, and
//! post-processing (§4.4).

use crate::embeddings::EmbeddingClient;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::storage::{FilterExpr, SearchParams, VectorStore};
use crate::types::{OptimizeFor, RetrievalPerformance, RetrievedMemory};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// A retrieval request (§4.4 contract).
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub table: String,
    pub query_text: String,
    pub filters: Vec<FilterExpr>,
    pub limit: usize,
    pub optimize_for: OptimizeFor,
}

/// The outcome of [`RetrievalEngine::retrieve`]: either a result set, or an
/// explicit soft-failure kind the caller (the Orchestrator) degrades around
/// (§4.4 "Failure modes").
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    Found {
        items: Vec<RetrievedMemory>,
        performance: RetrievalPerformance,
    },
    EmbeddingUnavailable,
}

pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    retry: RetryPolicy,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            store,
            embeddings,
            retry: RetryPolicy::new(),
        }
    }

    /// Table provisioning (§4.4 step 1, `V1`): re-create the table if it is
    /// missing or its declared dimension disagrees with the active model's.
    /// Pre-existing rows are dropped silently on re-create — embeddings are
    /// regenerable from `content`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] on a backend fault.
    #[instrument(skip(self))]
    pub async fn ensure_table(&self, table: &str) -> Result<usize> {
        let dimension = self.embeddings.dimension();
        match self.store.describe_table(table).await? {
            Some(info) if info.dimension == dimension => {}
            _ => {
                tracing::info!(table, dimension, "provisioning vector table");
                self.store.create_table(table, dimension).await?;
            }
        }
        Ok(dimension)
    }

    /// Run the full query pipeline (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the vector store faults; an
    /// embedding-service fault is NOT propagated as an error — it surfaces
    /// as `RetrievalOutcome::EmbeddingUnavailable` instead (soft-fail policy).
    #[instrument(skip(self, query), fields(table = %query.table, limit = query.limit))]
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalOutcome> {
        let start = Instant::now();

        self.ensure_table(&query.table).await?;

        let embed_result = self
            .retry
            .execute(|| self.embeddings.embed(&query.query_text))
            .await;
        let embedding = match embed_result {
            Ok(r) => r.embedding,
            Err(e) => {
                tracing::warn!(error = %e, "embedding unavailable, degrading retrieval");
                return Ok(RetrievalOutcome::EmbeddingUnavailable);
            }
        };

        let row_count = self.store.row_count(&query.table).await?;
        let probes = Self::select_probes(query.optimize_for, row_count);

        let hits = self
            .store
            .search(
                &query.table,
                &embedding,
                &query.filters,
                SearchParams { limit: query.limit, probes },
            )
            .await?;

        let items = hits
            .into_iter()
            .map(|hit| RetrievedMemory {
                id: hit.id,
                content: hit.content,
                similarity: hit.similarity.clamp(0.0, 1.0),
                importance: hit.importance,
                created_at: hit.created_at,
                metadata: hit.metadata,
            })
            .collect();

        Ok(RetrievalOutcome::Found {
            items,
            performance: RetrievalPerformance {
                duration_ms: start.elapsed().as_millis() as u64,
                probes,
                optimize_for: query.optimize_for,
            },
        })
    }

    /// Search-parameter selection by `optimize_for` and row count (§4.4
    /// step 3).
    #[must_use]
    pub fn select_probes(optimize_for: OptimizeFor, row_count: u64) -> u32 {
        let bucket = if row_count < 10_000 {
            0
        } else if row_count < 100_000 {
            1
        } else {
            2
        };
        match (optimize_for, bucket) {
            (OptimizeFor::Speed, 0) => 1,
            (OptimizeFor::Speed, 1) => 5,
            (OptimizeFor::Speed, _) => 10,
            (OptimizeFor::Balanced, 0) => 5,
            (OptimizeFor::Balanced, 1) => 20,
            (OptimizeFor::Balanced, _) => 40,
            (OptimizeFor::Accuracy, 0) => 10,
            (OptimizeFor::Accuracy, 1) => 50,
            (OptimizeFor::Accuracy, _) => 100,
        }
    }

    /// Compile the small filter DSL's hard `user_id` scope together with
    /// any caller-supplied optional filters (`session_id`, `memory_type`,
    /// `importance`), as the Orchestrator does before calling `retrieve`.
    #[must_use]
    pub fn scoped_filters(user_id: &str, extra: Vec<FilterExpr>) -> Vec<FilterExpr> {
        let mut filters = vec![FilterExpr::Eq("user_id".to_string(), serde_json::json!(user_id))];
        filters.extend(extra);
        filters
    }
}

impl From<Error> for RetrievalOutcome {
    fn from(_: Error) -> Self {
        RetrievalOutcome::EmbeddingUnavailable
    }
}
