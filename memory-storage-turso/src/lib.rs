//! # Memory Storage - Turso
//!
//! libSQL/Turso-backed [`memory_core::VectorStore`] for the `DB` and
//! `RAG_INDEX` tiers: durable per-user vector tables, connection pooling,
//! and index maintenance.
//!
//! ```no_run
//! use memory_storage_turso::TursoStore;
//!
//! # async fn example() -> memory_core::Result<()> {
//! let store = TursoStore::connect("libsql://localhost:8080", "token").await?;
//! # Ok(())
//! # }
//! ```

pub mod pool;
mod store;

pub use pool::{ConnectionPool, PoolConfig, PoolStatistics};
pub use store::TursoStore;
