//! Vector store abstraction (§4.4, §6): the seam the Retrieval Engine and
//! Index Optimizer compile against, implemented by `memory-storage-turso`
//! (libSQL, durable) and `memory-storage-redb` (the CACHE tier).

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The filter DSL compiled from a retrieval request's scoping predicates
/// (§4.4 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FilterExpr {
    Eq(String, serde_json::Value),
    In(String, Vec<serde_json::Value>),
    Gte(String, serde_json::Value),
    Lte(String, serde_json::Value),
}

impl FilterExpr {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            FilterExpr::Eq(f, _) | FilterExpr::In(f, _) | FilterExpr::Gte(f, _) | FilterExpr::Lte(f, _) => f,
        }
    }
}

/// A row to persist into a vector table (§3 `(id, content, embedding
/// vector(d), metadata, user_id?, session_id?, memory_type?, created_at,
/// updated_at)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRow {
    pub id: uuid::Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub user_id: String,
    pub session_id: Option<String>,
    pub memory_type: Option<String>,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `describe_table` returns about an existing table (§4.4 step 1).
#[derive(Debug, Clone, Copy)]
pub struct TableInfo {
    pub dimension: usize,
    pub row_count: u64,
}

/// Parameters controlling an ANN search (§4.4 step 3, §4.5).
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub limit: usize,
    pub probes: u32,
}

/// An index build requested by the Index Optimizer (§4.5).
#[derive(Debug, Clone)]
pub enum IndexSpec {
    None,
    IvfFlat { lists: u32, probes: u32 },
    CompositeIvfFlat { lists: u32, probes: u32, composite_columns: Vec<String> },
    Hnsw { m: u32, ef_construction: u32, ef_search: u32 },
}

/// A row returned from `search`, before the engine's post-processing
/// (similarity clamp, JSON-metadata decode) is applied.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: uuid::Uuid,
    pub content: String,
    pub similarity: f32,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Unified vector-store backend trait (§4.4, §6). All operations are async
/// so embedded stores (redb) can `spawn_blocking` internally the same way
/// network-backed stores (libSQL) await I/O.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inspect a table's declared embedding dimension and row count, or
    /// `None` if it does not exist (§4.4 step 1, `V1`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>>;

    /// Create (or destructively re-create, per §9) a table with the given
    /// embedding dimension. Non-vector indexes are created first, the
    /// vector index last — implementations must preserve this order because
    /// a freshly re-created table rebuilds all indexes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn create_table(&self, table: &str, dimension: usize) -> Result<()>;

    /// Insert one row. Writes carry zero retries at this layer (§9).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault
    /// or [`crate::error::Error::DimensionMismatch`] if `row.embedding.len()`
    /// disagrees with the table's declared dimension.
    async fn insert(&self, table: &str, row: &VectorRow) -> Result<()>;

    /// Cosine-distance nearest-neighbor search with the given scoping
    /// filters (§4.4 step 5). `user_id` is always enforced by the caller as
    /// a hard filter before this is invoked.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn search(
        &self,
        table: &str,
        query_embedding: &[f32],
        filters: &[FilterExpr],
        params: SearchParams,
    ) -> Result<Vec<SearchHit>>;

    /// Total row count, used by the Index Optimizer's strategy table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Count of distinct `user_id` values, used by the Index Optimizer's
    /// strategy table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn unique_users(&self, table: &str) -> Result<u64>;

    /// Build the requested index, and run `ANALYZE` afterward (§4.5).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn build_index(&self, table: &str, spec: &IndexSpec) -> Result<()>;

    /// Delete a row by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn delete(&self, table: &str, id: uuid::Uuid) -> Result<()>;
}

pub mod mock {
    //! An in-memory [`VectorStore`] used by `memory-core`'s own tests and by
    //! `test-utils` for cross-crate integration tests.
    use super::{FilterExpr, IndexSpec, Result, SearchHit, SearchParams, TableInfo, VectorRow, VectorStore};
    use crate::embeddings::cosine_similarity;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Table {
        dimension: usize,
        rows: Vec<VectorRow>,
    }

    #[derive(Default)]
    pub struct InMemoryVectorStore {
        tables: Mutex<HashMap<String, Table>>,
    }

    fn matches(row: &VectorRow, filter: &FilterExpr) -> bool {
        let value = match filter.field() {
            "user_id" => serde_json::Value::String(row.user_id.clone()),
            "session_id" => row
                .session_id
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
            "memory_type" => row
                .memory_type
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
            "importance" => serde_json::json!(row.importance),
            other => row.metadata.get(other).cloned().unwrap_or(serde_json::Value::Null),
        };
        match filter {
            FilterExpr::Eq(_, v) => &value == v,
            FilterExpr::In(_, vs) => vs.contains(&value),
            FilterExpr::Gte(_, v) => as_f64(&value) >= as_f64(v),
            FilterExpr::Lte(_, v) => as_f64(&value) <= as_f64(v),
        }
    }

    fn as_f64(v: &serde_json::Value) -> f64 {
        v.as_f64().unwrap_or(f64::NAN)
    }

    #[async_trait]
    impl VectorStore for InMemoryVectorStore {
        async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>> {
            let tables = self.tables.lock();
            Ok(tables.get(table).map(|t| TableInfo {
                dimension: t.dimension,
                row_count: t.rows.len() as u64,
            }))
        }

        async fn create_table(&self, table: &str, dimension: usize) -> Result<()> {
            self.tables.lock().insert(table.to_string(), Table { dimension, rows: Vec::new() });
            Ok(())
        }

        async fn insert(&self, table: &str, row: &VectorRow) -> Result<()> {
            let mut tables = self.tables.lock();
            let t = tables.entry(table.to_string()).or_insert_with(|| Table {
                dimension: row.embedding.len(),
                rows: Vec::new(),
            });
            if !row.embedding.is_empty() && row.embedding.len() != t.dimension {
                return Err(crate::error::Error::DimensionMismatch {
                    expected: t.dimension,
                    actual: row.embedding.len(),
                });
            }
            t.rows.retain(|r| r.id != row.id);
            t.rows.push(row.clone());
            Ok(())
        }

        async fn search(
            &self,
            table: &str,
            query_embedding: &[f32],
            filters: &[FilterExpr],
            params: SearchParams,
        ) -> Result<Vec<SearchHit>> {
            let tables = self.tables.lock();
            let Some(t) = tables.get(table) else {
                return Ok(Vec::new());
            };
            let mut hits: Vec<SearchHit> = t
                .rows
                .iter()
                .filter(|row| filters.iter().all(|f| matches(row, f)))
                .map(|row| SearchHit {
                    id: row.id,
                    content: row.content.clone(),
                    similarity: cosine_similarity(query_embedding, &row.embedding).clamp(0.0, 1.0),
                    importance: row.importance,
                    created_at: row.created_at,
                    metadata: row.metadata.clone(),
                })
                .collect();
            hits.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            hits.truncate(params.limit);
            Ok(hits)
        }

        async fn row_count(&self, table: &str) -> Result<u64> {
            Ok(self.tables.lock().get(table).map_or(0, |t| t.rows.len() as u64))
        }

        async fn unique_users(&self, table: &str) -> Result<u64> {
            let tables = self.tables.lock();
            let Some(t) = tables.get(table) else {
                return Ok(0);
            };
            let users: std::collections::HashSet<&str> = t.rows.iter().map(|r| r.user_id.as_str()).collect();
            Ok(users.len() as u64)
        }

        async fn build_index(&self, _table: &str, _spec: &IndexSpec) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, table: &str, id: uuid::Uuid) -> Result<()> {
            if let Some(t) = self.tables.lock().get_mut(table) {
                t.rows.retain(|r| r.id != id);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryVectorStore;
    use super::*;
    use chrono::Utc;

    fn row(user_id: &str, embedding: Vec<f32>, importance: f32) -> VectorRow {
        VectorRow {
            id: uuid::Uuid::new_v4(),
            content: "x".to_string(),
            embedding,
            metadata: HashMap::new(),
            user_id: user_id.to_string(),
            session_id: None,
            memory_type: None,
            importance,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_then_search_returns_the_row() {
        let store = InMemoryVectorStore::default();
        store.create_table("memories", 3).await.unwrap();
        store.insert("memories", &row("u1", vec![1.0, 0.0, 0.0], 5.0)).await.unwrap();

        let hits = store
            .search("memories", &[1.0, 0.0, 0.0], &[FilterExpr::Eq("user_id".into(), serde_json::json!("u1"))], SearchParams { limit: 10, probes: 5 })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::default();
        store.create_table("memories", 3).await.unwrap();
        let result = store.insert("memories", &row("u1", vec![1.0, 0.0], 5.0)).await;
        assert!(matches!(result, Err(crate::error::Error::DimensionMismatch { expected: 3, actual: 2 })));
    }

    #[tokio::test]
    async fn user_id_filter_scopes_results() {
        let store = InMemoryVectorStore::default();
        store.create_table("memories", 2).await.unwrap();
        store.insert("memories", &row("u1", vec![1.0, 0.0], 5.0)).await.unwrap();
        store.insert("memories", &row("u2", vec![1.0, 0.0], 5.0)).await.unwrap();

        let hits = store
            .search("memories", &[1.0, 0.0], &[FilterExpr::Eq("user_id".into(), serde_json::json!("u1"))], SearchParams { limit: 10, probes: 5 })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn tie_break_orders_by_importance_then_recency() {
        let store = InMemoryVectorStore::default();
        store.create_table("memories", 2).await.unwrap();
        let mut low = row("u1", vec![1.0, 0.0], 2.0);
        let mut high = row("u1", vec![1.0, 0.0], 8.0);
        low.created_at = Utc::now();
        high.created_at = low.created_at;
        store.insert("memories", &low).await.unwrap();
        store.insert("memories", &high).await.unwrap();

        let hits = store
            .search("memories", &[1.0, 0.0], &[], SearchParams { limit: 10, probes: 5 })
            .await
            .unwrap();
        assert_eq!(hits[0].importance, 8.0);
    }

    #[tokio::test]
    async fn describe_table_reports_dimension_and_count() {
        let store = InMemoryVectorStore::default();
        store.create_table("memories", 4).await.unwrap();
        store.insert("memories", &row("u1", vec![1.0, 0.0, 0.0, 0.0], 5.0)).await.unwrap();
        let info = store.describe_table("memories").await.unwrap().unwrap();
        assert_eq!(info.dimension, 4);
        assert_eq!(info.row_count, 1);
    }

    #[tokio::test]
    async fn describe_missing_table_is_none() {
        let store = InMemoryVectorStore::default();
        assert!(store.describe_table("nope").await.unwrap().is_none());
    }
}
