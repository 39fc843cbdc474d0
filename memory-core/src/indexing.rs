//! Index Optimizer (C5): keep the ANN index matched to data scale and
//! shape (§4.5).

use crate::constants::defaults;
use crate::storage::{IndexSpec, VectorStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Inputs the strategy table dispatches on (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub total_rows: u64,
    pub unique_users: u64,
}

impl IndexStats {
    #[must_use]
    fn power_user_ratio(&self, power_users: u64) -> f32 {
        if self.unique_users == 0 {
            0.0
        } else {
            power_users as f32 / self.unique_users as f32
        }
    }
}

/// One row of the strategy table (§4.5), named for tool-response surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexStrategy {
    None,
    IvfFlatBasic { lists: u32, probes: u32 },
    IvfFlatAccurate { lists: u32, probes: u32 },
    IvfFlatFast { lists: u32, probes: u32 },
    PartitionedIvfFlat { lists: u32, probes: u32 },
    Hnsw { m: u32, ef_construction: u32, ef_search: u32 },
}

impl IndexStrategy {
    /// The stable `strategy.type` string surfaced in tool responses.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            IndexStrategy::None => "none",
            IndexStrategy::IvfFlatBasic { .. } => "ivfflat_basic",
            IndexStrategy::IvfFlatAccurate { .. } => "ivfflat_accurate",
            IndexStrategy::IvfFlatFast { .. } => "ivfflat_fast",
            IndexStrategy::PartitionedIvfFlat { .. } => "partitioned_ivfflat",
            IndexStrategy::Hnsw { .. } => "hnsw",
        }
    }
}

/// A single benchmark sample from [`IndexOptimizer::benchmark`] (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkResult {
    pub optimize_for: crate::types::OptimizeFor,
    pub avg_duration_ms: f64,
}

pub struct IndexOptimizer {
    store: Arc<dyn VectorStore>,
    last_optimized: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl IndexOptimizer {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            last_optimized: Mutex::new(HashMap::new()),
        }
    }

    /// Strategy selection by row count *N*, unique users *U*, and power-user
    /// ratio (§4.5's table). `power_users` counts users at or above the
    /// `power≥1000` memories/user bucket.
    #[must_use]
    pub fn select_strategy(stats: IndexStats, power_users: u64) -> IndexStrategy {
        let n = stats.total_rows;
        let u = stats.unique_users;

        if n < defaults::INDEX_MIN_ROWS_IVFFLAT {
            return IndexStrategy::None;
        }
        if n < 10_000 {
            return IndexStrategy::IvfFlatBasic {
                lists: (n / 100).max(10) as u32,
                probes: 5,
            };
        }
        if n < 100_000 {
            return if stats.power_user_ratio(power_users) > 0.2 {
                IndexStrategy::IvfFlatAccurate {
                    lists: (n / 500).max(50) as u32,
                    probes: 20,
                }
            } else {
                IndexStrategy::IvfFlatFast {
                    lists: (n / 1_000).max(30) as u32,
                    probes: 10,
                }
            };
        }
        if u < 1_000 {
            return IndexStrategy::PartitionedIvfFlat { lists: 1_000, probes: 15 };
        }
        if n < 500_000 {
            IndexStrategy::Hnsw { m: 16, ef_construction: 200, ef_search: 100 }
        } else {
            IndexStrategy::Hnsw { m: 32, ef_construction: 400, ef_search: 100 }
        }
    }

    /// Skip if optimized within the cooldown window (unless `force`) or row
    /// count is below the optimization floor (§4.5).
    #[must_use]
    pub fn should_optimize(&self, table: &str, row_count: u64, force: bool) -> bool {
        if row_count < defaults::INDEX_MIN_ROWS_TO_OPTIMIZE {
            return false;
        }
        if force {
            return true;
        }
        let last = self.last_optimized.lock();
        match last.get(table) {
            Some(last_run) => Utc::now().signed_duration_since(*last_run).to_std().unwrap_or_default()
                >= defaults::INDEX_OPTIMIZATION_COOLDOWN,
            None => true,
        }
    }

    /// Build the selected strategy's index and run `ANALYZE` (§4.5). On
    /// HNSW construction failure, falls back to IVFFlat-accurate with
    /// `lists=1000, probes=50`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] if both the
    /// primary strategy and the HNSW fallback fail to build.
    #[instrument(skip(self))]
    pub async fn optimize(
        &self,
        table: &str,
        stats: IndexStats,
        power_users: u64,
        force: bool,
    ) -> crate::error::Result<IndexStrategy> {
        if !self.should_optimize(table, stats.total_rows, force) {
            return Ok(IndexStrategy::None);
        }

        let strategy = Self::select_strategy(stats, power_users);
        let spec = Self::to_spec(&strategy);

        let build_result = self.store.build_index(table, &spec).await;
        let applied = match build_result {
            Ok(()) => strategy,
            Err(e) if matches!(strategy, IndexStrategy::Hnsw { .. }) => {
                tracing::warn!(table, error = %e, "hnsw construction failed, falling back to ivfflat_accurate");
                let fallback = IndexStrategy::IvfFlatAccurate { lists: 1_000, probes: 50 };
                self.store.build_index(table, &Self::to_spec(&fallback)).await?;
                fallback
            }
            Err(e) => return Err(e),
        };

        self.last_optimized.lock().insert(table.to_string(), Utc::now());
        Ok(applied)
    }

    fn to_spec(strategy: &IndexStrategy) -> IndexSpec {
        match strategy {
            IndexStrategy::None => IndexSpec::None,
            IndexStrategy::IvfFlatBasic { lists, probes } => IndexSpec::IvfFlat { lists: *lists, probes: *probes },
            IndexStrategy::IvfFlatFast { lists, probes } => IndexSpec::IvfFlat { lists: *lists, probes: *probes },
            IndexStrategy::IvfFlatAccurate { lists, probes } => IndexSpec::CompositeIvfFlat {
                lists: *lists,
                probes: *probes,
                composite_columns: vec!["user_id".to_string(), "importance".to_string()],
            },
            IndexStrategy::PartitionedIvfFlat { lists, probes } => IndexSpec::CompositeIvfFlat {
                lists: *lists,
                probes: *probes,
                composite_columns: vec!["user_id".to_string(), "embedding".to_string()],
            },
            IndexStrategy::Hnsw { m, ef_construction, ef_search } => IndexSpec::Hnsw {
                m: *m,
                ef_construction: *ef_construction,
                ef_search: *ef_search,
            },
        }
    }
}
