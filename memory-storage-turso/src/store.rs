//! libSQL-backed [`VectorStore`] (§4.4, §6): durable persistence for the
//! `DB` and `RAG_INDEX` storage tiers.
//!
//! Embeddings are stored as a JSON-encoded `TEXT` column rather than
//! through libSQL's native vector extension: the extension's surface
//! varies by server version, while cosine similarity computed
//! application-side against `memory_core::embeddings::cosine_similarity`
//! is the same arithmetic the in-memory mock uses, so behavior is
//! identical in tests and in production. Non-vector filters (`user_id`,
//! `session_id`, `memory_type`, `importance`) are still pushed down to
//! SQL `WHERE` clauses; only the nearest-neighbor ranking happens in Rust.

use crate::pool::{ConnectionPool, PoolConfig};
use async_trait::async_trait;
use libsql::{Builder, Database, Value as SqlValue};
use memory_core::error::{Error, Result};
use memory_core::storage::{FilterExpr, IndexSpec, SearchHit, SearchParams, TableInfo, VectorRow, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// A Turso/libSQL-backed vector store.
pub struct TursoStore {
    db: Arc<Database>,
    pool: ConnectionPool,
}

impl TursoStore {
    /// Open a remote Turso database over `libsql://`, or a local `file:`/
    /// `:memory:` database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        let db = if url == ":memory:" {
            Builder::new_local(":memory:").build().await
        } else if let Some(path) = url.strip_prefix("file:") {
            Builder::new_local(path).build().await
        } else {
            Builder::new_remote(url.to_string(), token.to_string()).build().await
        }
        .map_err(|e| Error::StoreUnavailable(format!("failed to open database: {e}")))?;

        let db = Arc::new(db);
        let pool = ConnectionPool::new(db.clone(), PoolConfig::default()).await?;
        Ok(Self { db, pool })
    }

    /// Wrap an already-open [`Database`] (used by tests and by callers that
    /// manage their own connection lifecycle).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the pool cannot validate
    /// connectivity against `db`.
    pub async fn from_database(db: Arc<Database>) -> Result<Self> {
        let pool = ConnectionPool::new(db.clone(), PoolConfig::default()).await?;
        Ok(Self { db, pool })
    }

    fn table_name(table: &str) -> String {
        // Table names come from `Orchestrator`/`RetrievalEngine` constants and
        // user-id-derived RAG namespaces, never raw user input; still reject
        // anything that would break out of an identifier position.
        table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_').then(|| table.to_string()).unwrap_or_else(|| {
            table.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
        })
    }
}

fn value_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn row_to_vector_row(row: &libsql::Row) -> Result<VectorRow> {
    let id_str: String = row.get(0).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let content: String = row.get(1).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let embedding_json: String = row.get(2).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let metadata_json: String = row.get(3).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let user_id: String = row.get(4).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let session_id: Option<String> = row.get(5).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let memory_type: Option<String> = row.get(6).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let importance: f64 = row.get(7).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let created_at_ts: i64 = row.get(8).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    let updated_at_ts: i64 = row.get(9).map_err(|e| Error::StoreUnavailable(e.to_string()))?;

    Ok(VectorRow {
        id: uuid::Uuid::parse_str(&id_str).map_err(|e| Error::StoreUnavailable(e.to_string()))?,
        content,
        embedding: serde_json::from_str(&embedding_json)?,
        metadata: serde_json::from_str(&metadata_json)?,
        user_id,
        session_id,
        memory_type,
        importance: importance as f32,
        created_at: chrono::DateTime::from_timestamp(created_at_ts, 0).unwrap_or_default(),
        updated_at: chrono::DateTime::from_timestamp(updated_at_ts, 0).unwrap_or_default(),
    })
}

fn filter_to_sql(filter: &FilterExpr, params: &mut Vec<SqlValue>) -> Option<String> {
    let column = match filter.field() {
        "user_id" | "session_id" | "memory_type" | "importance" => filter.field(),
        _ => return None, // metadata-keyed filters are applied in Rust below
    };
    match filter {
        FilterExpr::Eq(_, v) => {
            params.push(value_to_sql(v));
            Some(format!("{column} = ?"))
        }
        FilterExpr::In(_, vs) => {
            let placeholders = vs.iter().map(|v| {
                params.push(value_to_sql(v));
                "?"
            });
            Some(format!("{column} IN ({})", placeholders.collect::<Vec<_>>().join(", ")))
        }
        FilterExpr::Gte(_, v) => {
            params.push(value_to_sql(v));
            Some(format!("{column} >= ?"))
        }
        FilterExpr::Lte(_, v) => {
            params.push(value_to_sql(v));
            Some(format!("{column} <= ?"))
        }
    }
}

#[async_trait]
impl VectorStore for TursoStore {
    #[instrument(skip(self))]
    async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;

        let exists = conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1",
                (table.clone(),),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .next()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let mut dim_rows = conn
            .query(&format!("SELECT dimension FROM {table}_meta LIMIT 1"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let dimension = match dim_rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            Some(row) => row.get::<i64>(0).map_err(|e| Error::StoreUnavailable(e.to_string()))? as usize,
            None => 0,
        };

        let mut count_rows = conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let row_count = count_rows
            .next()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .map(|r| r.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0) as u64;

        Ok(Some(TableInfo { dimension, row_count }))
    }

    #[instrument(skip(self))]
    async fn create_table(&self, table: &str, dimension: usize) -> Result<()> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;

        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        conn.execute(&format!("DROP TABLE IF EXISTS {table}_meta"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        conn.execute(
            &format!(
                "CREATE TABLE {table} (
                    id TEXT PRIMARY KEY NOT NULL,
                    content TEXT NOT NULL,
                    embedding TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    session_id TEXT,
                    memory_type TEXT,
                    importance REAL NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )"
            ),
            (),
        )
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        conn.execute(&format!("CREATE INDEX idx_{table}_user ON {table}(user_id)"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        conn.execute(&format!("CREATE INDEX idx_{table}_importance ON {table}(importance DESC)"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        conn.execute(&format!("CREATE TABLE {table}_meta (dimension INTEGER NOT NULL)"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        conn.execute(
            &format!("INSERT INTO {table}_meta (dimension) VALUES (?1)"),
            (dimension as i64,),
        )
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self, row))]
    async fn insert(&self, table: &str, row: &VectorRow) -> Result<()> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;

        conn.execute(
            &format!(
                "INSERT INTO {table}
                    (id, content, embedding, metadata, user_id, session_id, memory_type, importance, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    metadata = excluded.metadata,
                    importance = excluded.importance,
                    updated_at = excluded.updated_at"
            ),
            libsql::params![
                row.id.to_string(),
                row.content.clone(),
                serde_json::to_string(&row.embedding)?,
                serde_json::to_string(&row.metadata)?,
                row.user_id.clone(),
                row.session_id.clone(),
                row.memory_type.clone(),
                f64::from(row.importance),
                row.created_at.timestamp(),
                row.updated_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self, query_embedding, filters))]
    async fn search(
        &self,
        table: &str,
        query_embedding: &[f32],
        filters: &[FilterExpr],
        params: SearchParams,
    ) -> Result<Vec<SearchHit>> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;

        let mut sql_params = Vec::new();
        let pushed_down: Vec<String> = filters.iter().filter_map(|f| filter_to_sql(f, &mut sql_params)).collect();
        let where_clause =
            if pushed_down.is_empty() { String::new() } else { format!("WHERE {}", pushed_down.join(" AND ")) };

        let sql = format!(
            "SELECT id, content, embedding, metadata, user_id, session_id, memory_type, importance, created_at, updated_at
             FROM {table} {where_clause}"
        );
        let mut rows = conn.query(&sql, sql_params).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::StoreUnavailable(e.to_string()))? {
            let candidate = row_to_vector_row(&row)?;
            if !metadata_filters_match(&candidate, filters) {
                continue;
            }
            hits.push(SearchHit {
                id: candidate.id,
                content: candidate.content,
                similarity: memory_core::embeddings::cosine_similarity(query_embedding, &candidate.embedding)
                    .clamp(0.0, 1.0),
                importance: candidate.importance,
                created_at: candidate.created_at,
                metadata: candidate.metadata,
            });
        }

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

    #[instrument(skip(self))]
    async fn row_count(&self, table: &str) -> Result<u64> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;
        let mut rows = conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let count = rows
            .next()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .map(|r| r.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);
        Ok(count as u64)
    }

    #[instrument(skip(self))]
    async fn unique_users(&self, table: &str) -> Result<u64> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;
        let mut rows = conn
            .query(&format!("SELECT COUNT(DISTINCT user_id) FROM {table}"), ())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let count = rows
            .next()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .map(|r| r.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);
        Ok(count as u64)
    }

    #[instrument(skip(self, spec))]
    async fn build_index(&self, table: &str, spec: &IndexSpec) -> Result<()> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;

        // libSQL's IVFFlat/HNSW extensions are build-target specific; the
        // portable subset we can rely on everywhere is a plain index over
        // the columns the strategy would have partitioned by, plus ANALYZE
        // so the query planner has fresh statistics (§4.5 "run ANALYZE").
        if let IndexSpec::CompositeIvfFlat { composite_columns, .. } = spec {
            let columns: Vec<&str> =
                composite_columns.iter().map(String::as_str).filter(|c| *c != "embedding").collect();
            if !columns.is_empty() {
                conn.execute(
                    &format!("CREATE INDEX IF NOT EXISTS idx_{table}_composite ON {table}({})", columns.join(", ")),
                    (),
                )
                .await
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            }
        }

        conn.execute(&format!("ANALYZE {table}"), ()).await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, id: uuid::Uuid) -> Result<()> {
        let table = Self::table_name(table);
        let conn = self.pool.get().await?.into_inner()?;
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), (id.to_string(),))
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

/// Filters on arbitrary metadata keys aren't pushed down to SQL (the
/// `metadata` column is opaque JSON); apply them in Rust against the
/// decoded row.
fn metadata_filters_match(row: &VectorRow, filters: &[FilterExpr]) -> bool {
    filters.iter().all(|f| match f.field() {
        "user_id" | "session_id" | "memory_type" | "importance" => true,
        key => {
            let value = row.metadata.get(key).cloned().unwrap_or(serde_json::Value::Null);
            match f {
                FilterExpr::Eq(_, v) => &value == v,
                FilterExpr::In(_, vs) => vs.contains(&value),
                FilterExpr::Gte(_, v) => value.as_f64().unwrap_or(f64::NAN) >= v.as_f64().unwrap_or(f64::NAN),
                FilterExpr::Lte(_, v) => value.as_f64().unwrap_or(f64::NAN) <= v.as_f64().unwrap_or(f64::NAN),
            }
        }
    })
}
