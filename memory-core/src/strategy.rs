//! Strategy Planner (C3): physical storage placement, cost estimation, and
//! adaptive re-planning from usage statistics (§4.3).

use crate::constants::defaults;
use crate::types::MemoryPath;
use serde::{Deserialize, Serialize};

/// One of the four physical storage tiers (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Db,
    RagIndex,
    Cache,
    Archive,
}

/// The physical storage plan produced by [`StrategyPlanner::plan`] (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStrategy {
    pub primary: Location,
    pub secondary: Vec<Location>,
    pub includes_rag: bool,
    pub includes_embedding: bool,
    /// `None` means no expiry (stored `∞` in the spec's table).
    pub ttl_seconds: Option<u64>,
    pub compression: bool,
    pub index_for_search: bool,
}

/// Usage statistics consumed by [`StrategyPlanner::replan`] (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct UsageStats {
    pub daily_access_count: u32,
    pub days_since_last_access: u32,
    pub search_hit_rate: f32,
}

/// Observability-only cost projection (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub storage_cost: f32,
    pub retrieval_cost: f32,
    pub total_monthly: f32,
}

/// Per-location multipliers used by the cost estimator. Not normative
/// dollar figures, just a stable relative scale for adaptive decisions and
/// the `analyze_content` surface.
const STORAGE_COST_PER_LOCATION: &[(Location, f32)] = &[
    (Location::Db, 1.0),
    (Location::RagIndex, 2.5),
    (Location::Cache, 0.5),
    (Location::Archive, 0.2),
];
const RETRIEVAL_COST_PER_LOCATION: &[(Location, f32)] = &[
    (Location::Db, 1.0),
    (Location::RagIndex, 3.0),
    (Location::Cache, 0.2),
    (Location::Archive, 4.0),
];

pub struct StrategyPlanner;

impl Default for StrategyPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Deterministic dispatch on `type_path` prefix and `importance`
    /// (§4.3's policy table).
    #[must_use]
    pub fn plan(&self, type_path: &MemoryPath, importance: f32, content_size_bytes: usize) -> StorageStrategy {
        let major_minor = type_path.major_minor();
        let large = content_size_bytes > defaults::LARGE_CONTENT_BYTES;

        match major_minor.as_str() {
            "personal/identity" => Self::db_rag_cache(),
            "personal/preference" if importance >= 7.0 => Self::db_rag_cache(),
            "personal/preference" => Self::db_archive(true),
            "knowledge/skill" => Self::db_rag_cache(),
            "knowledge/experience" if large => Self::db_archive(true),
            "knowledge/experience" => Self::db_only(),
            "temporal/conversation" => Self::db_only(),
            "temporal/context" => Self::cache_only(),
            _ if importance >= 8.0 => Self::db_rag_cache(),
            _ if importance >= 6.0 => Self::db_archive(large),
            _ if importance >= 4.0 => Self::db_only(),
            _ => Self::cache_only(),
        }
    }

    fn db_rag_cache() -> StorageStrategy {
        StorageStrategy {
            primary: Location::Db,
            secondary: vec![Location::RagIndex, Location::Cache],
            includes_rag: true,
            includes_embedding: true,
            ttl_seconds: None,
            compression: false,
            index_for_search: true,
        }
    }

    fn db_archive(compression: bool) -> StorageStrategy {
        StorageStrategy {
            primary: Location::Db,
            secondary: vec![Location::Archive],
            includes_rag: false,
            includes_embedding: true,
            ttl_seconds: None,
            compression,
            index_for_search: false,
        }
    }

    fn db_only() -> StorageStrategy {
        StorageStrategy {
            primary: Location::Db,
            secondary: vec![],
            includes_rag: false,
            includes_embedding: true,
            ttl_seconds: None,
            compression: false,
            index_for_search: false,
        }
    }

    fn cache_only() -> StorageStrategy {
        StorageStrategy {
            primary: Location::Cache,
            secondary: vec![],
            includes_rag: false,
            includes_embedding: false,
            ttl_seconds: Some(defaults::CACHE_TTL_SECONDS),
            compression: false,
            index_for_search: false,
        }
    }

    /// Fixed per-location multipliers times a size factor; observability
    /// only (§4.3).
    #[must_use]
    pub fn estimate_cost(&self, strategy: &StorageStrategy, content_size_bytes: usize) -> CostEstimate {
        let size_factor = (content_size_bytes as f32 / 1000.0).max(0.1);
        let locations: Vec<Location> = std::iter::once(strategy.primary)
            .chain(strategy.secondary.iter().copied())
            .collect();

        let storage_cost: f32 = locations
            .iter()
            .map(|loc| Self::lookup(STORAGE_COST_PER_LOCATION, *loc) * size_factor)
            .sum();
        let retrieval_cost: f32 = locations
            .iter()
            .map(|loc| Self::lookup(RETRIEVAL_COST_PER_LOCATION, *loc))
            .sum();

        CostEstimate {
            storage_cost,
            retrieval_cost,
            total_monthly: storage_cost + retrieval_cost,
        }
    }

    fn lookup(table: &[(Location, f32)], location: Location) -> f32 {
        table
            .iter()
            .find(|(loc, _)| *loc == location)
            .map_or(1.0, |(_, cost)| *cost)
    }

    /// Promote/demote locations from observed usage (§4.3). Applied on top
    /// of an existing strategy rather than recomputed from scratch, so a
    /// memory's prior placement is the starting point for re-planning.
    #[must_use]
    pub fn replan(&self, strategy: &StorageStrategy, stats: &UsageStats) -> StorageStrategy {
        let mut next = strategy.clone();

        if stats.daily_access_count > 0 && !next.secondary.contains(&Location::Cache) {
            next.secondary.push(Location::Cache);
        }

        if stats.days_since_last_access >= 30 {
            next.secondary.retain(|loc| *loc != Location::Cache);
            if !next.secondary.contains(&Location::Archive) {
                next.secondary.push(Location::Archive);
            }
            next.compression = true;
        }

        if stats.search_hit_rate < 0.1 {
            next.secondary.retain(|loc| *loc != Location::RagIndex);
            next.includes_rag = false;
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Major;

    fn path(major: Major, minor: &str, detail: &str) -> MemoryPath {
        MemoryPath::new(major, minor, detail)
    }

    #[test]
    fn identity_goes_to_db_rag_cache_with_no_ttl() {
        let planner = StrategyPlanner::new();
        let strategy = planner.plan(&path(Major::Personal, "identity", "name"), 9.0, 20);
        assert_eq!(strategy.primary, Location::Db);
        assert!(strategy.secondary.contains(&Location::RagIndex));
        assert!(strategy.secondary.contains(&Location::Cache));
        assert!(strategy.includes_rag);
        assert_eq!(strategy.ttl_seconds, None);
    }

    #[test]
    fn low_importance_preference_goes_to_archive_with_compression() {
        let planner = StrategyPlanner::new();
        let strategy = planner.plan(&path(Major::Personal, "preference", "food"), 5.0, 20);
        assert_eq!(strategy.primary, Location::Db);
        assert_eq!(strategy.secondary, vec![Location::Archive]);
        assert!(strategy.compression);
        assert!(!strategy.includes_rag);
    }

    #[test]
    fn temporal_context_is_cache_only_with_ttl() {
        let planner = StrategyPlanner::new();
        let strategy = planner.plan(&path(Major::Temporal, "context", "current"), 4.0, 20);
        assert_eq!(strategy.primary, Location::Cache);
        assert_eq!(strategy.ttl_seconds, Some(86_400));
        assert!(!strategy.includes_embedding);
    }

    #[test]
    fn large_experience_goes_to_archive() {
        let planner = StrategyPlanner::new();
        let strategy = planner.plan(&path(Major::Knowledge, "experience", "work"), 7.0, 2000);
        assert_eq!(strategy.secondary, vec![Location::Archive]);
        assert!(strategy.compression);
    }

    #[test]
    fn default_fallback_by_importance_band() {
        let planner = StrategyPlanner::new();
        let high = planner.plan(&path(Major::Knowledge, "fact", "general"), 8.5, 20);
        assert_eq!(high.primary, Location::Db);
        assert!(high.includes_rag);

        let low = planner.plan(&path(Major::Knowledge, "fact", "general"), 1.0, 20);
        assert_eq!(low.primary, Location::Cache);
    }

    #[test]
    fn replan_adds_cache_on_daily_access() {
        let planner = StrategyPlanner::new();
        let base = planner.plan(&path(Major::Knowledge, "experience", "work"), 7.0, 20);
        let stats = UsageStats {
            daily_access_count: 5,
            days_since_last_access: 0,
            search_hit_rate: 0.5,
        };
        let next = planner.replan(&base, &stats);
        assert!(next.secondary.contains(&Location::Cache));
    }

    #[test]
    fn replan_demotes_to_archive_after_thirty_days_idle() {
        let planner = StrategyPlanner::new();
        let base = StorageStrategy {
            primary: Location::Db,
            secondary: vec![Location::RagIndex, Location::Cache],
            includes_rag: true,
            includes_embedding: true,
            ttl_seconds: None,
            compression: false,
            index_for_search: true,
        };
        let stats = UsageStats {
            daily_access_count: 0,
            days_since_last_access: 45,
            search_hit_rate: 0.5,
        };
        let next = planner.replan(&base, &stats);
        assert!(!next.secondary.contains(&Location::Cache));
        assert!(next.secondary.contains(&Location::Archive));
        assert!(next.compression);
    }

    #[test]
    fn replan_drops_rag_on_low_hit_rate() {
        let planner = StrategyPlanner::new();
        let base = StrategyPlanner::new().plan(&path(Major::Personal, "identity", "name"), 9.0, 20);
        let stats = UsageStats {
            daily_access_count: 1,
            days_since_last_access: 1,
            search_hit_rate: 0.01,
        };
        let next = planner.replan(&base, &stats);
        assert!(!next.includes_rag);
        assert!(!next.secondary.contains(&Location::RagIndex));
    }

    #[test]
    fn cost_estimate_scales_with_content_size() {
        let planner = StrategyPlanner::new();
        let strategy = planner.plan(&path(Major::Personal, "identity", "name"), 9.0, 20);
        let small = planner.estimate_cost(&strategy, 100);
        let large = planner.estimate_cost(&strategy, 10_000);
        assert!(large.storage_cost > small.storage_cost);
        assert!(small.total_monthly > 0.0);
    }
}
