//! [`RedbCache`]: the `CACHE` tier's [`memory_core::MemoryCache`] backend.

use async_trait::async_trait;
use memory_core::error::{Error, Result};
use memory_core::MemoryCache;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

/// Timeout for a single redb transaction, run off the async runtime via
/// `spawn_blocking` (§4.3: the CACHE tier must not block the orchestrator).
const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_db_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::StoreUnavailable(format!("cache task join error: {join_err}"))),
        Err(_) => Err(Error::StoreUnavailable(format!("cache operation timed out after {DB_OPERATION_TIMEOUT:?}"))),
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Entry {
    value: serde_json::Value,
    /// Unix epoch milliseconds; `None` means no expiry.
    expires_at_ms: Option<u64>,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// An embedded redb database backing the `CACHE` tier.
pub struct RedbCache {
    db: Arc<Database>,
}

impl RedbCache {
    /// Open (creating if absent) a redb database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the file cannot be opened or
    /// the cache table cannot be created.
    pub async fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening redb cache database");
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            let db = Database::create(&path_buf)
                .map_err(|e| Error::StoreUnavailable(format!("failed to open redb database: {e}")))?;
            let write_txn =
                db.begin_write().map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            write_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| Error::StoreUnavailable(format!("failed to open cache table: {e}")))?;
            write_txn.commit().map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(db)
        })
        .await?;

        Ok(Self { db: Arc::new(db) })
    }

}

#[async_trait]
impl MemoryCache for RedbCache {
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let expires_at_ms = ttl.map(|d| now_ms() + d.as_millis() as u64);

        with_db_timeout(move || {
            let entry = Entry { value, expires_at_ms };
            let bytes = serde_json::to_vec(&entry)?;

            let write_txn =
                db.begin_write().map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("failed to open cache table: {e}")))?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| Error::StoreUnavailable(format!("insert failed: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        let found = with_db_timeout(move || {
            let read_txn =
                db.begin_read().map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
            let table = read_txn
                .open_table(CACHE_TABLE)
                .map_err(|e| Error::StoreUnavailable(format!("failed to open cache table: {e}")))?;
            let Some(guard) = table.get(key.as_str()).map_err(|e| Error::StoreUnavailable(format!("get failed: {e}")))?
            else {
                return Ok(None);
            };
            let entry: Entry = serde_json::from_slice(guard.value())?;
            Ok(Some((key, entry)))
        })
        .await?;

        let Some((key, entry)) = found else { return Ok(None) };
        if let Some(expires_at_ms) = entry.expires_at_ms {
            if now_ms() >= expires_at_ms {
                self.delete(&key).await?;
                return Ok(None);
            }
        }
        Ok(Some(entry.value))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        with_db_timeout(move || {
            let write_txn =
                db.begin_write().map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(CACHE_TABLE)
                    .map_err(|e| Error::StoreUnavailable(format!("failed to open cache table: {e}")))?;
                table.remove(key.as_str()).map_err(|e| Error::StoreUnavailable(format!("remove failed: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_test_cache() -> (RedbCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = RedbCache::open(&dir.path().join("cache.redb")).await.unwrap();
        (cache, dir)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (cache, _dir) = open_test_cache().await;
        cache.set("k", serde_json::json!({"a": 1}), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn expired_entry_is_absent_and_removed() {
        let (cache, _dir) = open_test_cache().await;
        cache.set("k", serde_json::json!(1), Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let (cache, _dir) = open_test_cache().await;
        cache.set("k", serde_json::json!(1), None).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let (cache, _dir) = open_test_cache().await;
        assert_eq!(cache.get("nope").await.unwrap(), None);
    }
}
