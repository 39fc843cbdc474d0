//! Cache tier seam (§3 `Locations::CACHE`, §4.3, §4.6.1): the fast,
//! TTL-bearing store the Strategy Planner routes low-importance and
//! `temporal/context/*` memories to. Implemented by `memory-storage-redb`;
//! an in-memory mock lives here for `memory-core`'s own tests.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Implemented by whatever backs the CACHE storage tier.
#[async_trait]
pub trait MemoryCache: Send + Sync {
    /// Store `value` under `key`. `ttl: None` means no expiry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()>;

    /// Fetch a previously-set value, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] on a backend fault.
    async fn delete(&self, key: &str) -> Result<()>;
}

pub mod mock {
    //! An in-memory [`MemoryCache`] used by `memory-core`'s own tests and by
    //! `test-utils`.
    use super::{MemoryCache, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    struct Entry {
        value: serde_json::Value,
        expires_at: Option<Instant>,
    }

    #[derive(Default)]
    pub struct InMemoryCache {
        entries: Mutex<HashMap<String, Entry>>,
    }

    #[async_trait]
    impl MemoryCache for InMemoryCache {
        async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()> {
            let expires_at = ttl.map(|d| Instant::now() + d);
            self.entries.lock().insert(key.to_string(), Entry { value, expires_at });
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get(key) else { return Ok(None) };
            if let Some(expires_at) = entry.expires_at {
                if Instant::now() >= expires_at {
                    entries.remove(key);
                    return Ok(None);
                }
            }
            Ok(Some(entry.value.clone()))
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.entries.lock().remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryCache;
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InMemoryCache::default();
        cache.set("k", serde_json::json!({"a": 1}), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let cache = InMemoryCache::default();
        cache
            .set("k", serde_json::json!(1), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InMemoryCache::default();
        cache.set("k", serde_json::json!(1), None).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
