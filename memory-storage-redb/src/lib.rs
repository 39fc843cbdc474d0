//! # Memory Storage - redb
//!
//! redb-backed [`memory_core::MemoryCache`] for the `CACHE` storage tier
//! (§4.3): an embedded key-value store with lazy TTL expiry, synchronous
//! redb operations wrapped in `spawn_blocking` with a timeout so the async
//! `MemoryCache` trait never blocks the runtime.
//!
//! ```no_run
//! use memory_storage_redb::RedbCache;
//! use std::path::Path;
//!
//! # async fn example() -> memory_core::Result<()> {
//! let cache = RedbCache::open(Path::new("./cache.redb")).await?;
//! # Ok(())
//! # }
//! ```

mod cache;

pub use cache::RedbCache;
