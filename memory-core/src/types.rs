//! Core data model: the [`Memory`] record, its hierarchical [`MemoryPath`],
//! and the small value types that travel between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The three enumerated top-level memory categories (§3, Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Major {
    Personal,
    Knowledge,
    Temporal,
}

impl fmt::Display for Major {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Major::Personal => "personal",
            Major::Knowledge => "knowledge",
            Major::Temporal => "temporal",
        };
        write!(f, "{s}")
    }
}

/// A hierarchical memory type path `major/minor/detail` (Glossary).
///
/// `minor` and `detail` are kept as owned strings rather than a closed
/// per-major enum: the classifier's trigger-keyword tree and the content
/// processor's per-type dispatch both key off the full enumerated set from
/// the specification, but callers of `store_memory` may also supply an
/// explicit type that is not a triggered classification, and rejecting that
/// outright would violate `V4` (the fallback path always accepts
/// `knowledge/fact/general`). Validity is enforced by [`MemoryPath::parse`]
/// and by construction in [`crate::classifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryPath {
    pub major: Major,
    pub minor: String,
    pub detail: String,
}

impl MemoryPath {
    #[must_use]
    pub fn new(major: Major, minor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            major,
            minor: minor.into(),
            detail: detail.into(),
        }
    }

    /// The `V4` fallback classification: `knowledge/fact/general`.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(Major::Knowledge, "fact", "general")
    }

    /// Render as `major/minor/detail`.
    #[must_use]
    pub fn to_path(&self) -> String {
        format!("{}/{}/{}", self.major, self.minor, self.detail)
    }

    /// `major/minor` prefix, used by the strategy planner and the
    /// importance table.
    #[must_use]
    pub fn major_minor(&self) -> String {
        format!("{}/{}", self.major, self.minor)
    }

    /// Parse a `major/minor/detail` string, e.g. one supplied explicitly by
    /// a caller of `store_memory` instead of produced by the classifier.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::Error::Validation`] if the string does not
    /// have exactly three `/`-separated segments or if `major` is not one of
    /// `personal`, `knowledge`, `temporal`.
    pub fn parse(path: &str) -> crate::error::Result<Self> {
        let mut parts = path.splitn(3, '/');
        let (major, minor, detail) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => {
                return Err(crate::error::Error::Validation(format!(
                    "memory type path must be major/minor/detail, got {path:?}"
                )))
            }
        };
        let major = match major {
            "personal" => Major::Personal,
            "knowledge" => Major::Knowledge,
            "temporal" => Major::Temporal,
            other => {
                return Err(crate::error::Error::Validation(format!(
                    "unknown memory major category {other:?}"
                )))
            }
        };
        Ok(Self::new(major, minor, detail))
    }
}

impl fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

/// The format `content` is stored in (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    Full,
    Structured,
    Json,
    Summary,
}

/// An extracted entity with its confidence (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub value: String,
    pub confidence: f32,
}

impl Entity {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            entity_type: entity_type.into(),
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// The atomic unit of persisted knowledge (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub session_id: Option<String>,
    pub memory_type: MemoryPath,
    pub content: String,
    pub original_content: Option<String>,
    pub importance: f32,
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
    pub entities: Vec<Entity>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// Clamp `importance` into `[0, 10]` (`V3`) and validate `user_id` is
    /// non-empty (`V2`, plus the empty-input boundary behavior of §8).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Validation`] if `user_id` is empty.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "user_id must not be empty".to_string(),
            ));
        }
        if !(0.0..=10.0).contains(&self.importance) {
            return Err(crate::error::Error::Validation(format!(
                "importance {} out of range [0, 10]",
                self.importance
            )));
        }
        Ok(())
    }
}

/// Result of [`crate::classifier::Classifier::classify`] (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryClassification {
    pub path: MemoryPath,
    pub confidence: f32,
}

impl MemoryClassification {
    #[must_use]
    pub fn new(path: MemoryPath, confidence: f32) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            path,
        }
    }
}

/// A similarity search hit returned by the retrieval engine (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub id: uuid::Uuid,
    pub content: String,
    pub similarity: f32,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Performance record attached to a retrieval (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalPerformance {
    pub duration_ms: u64,
    pub probes: u32,
    pub optimize_for: OptimizeFor,
}

/// Retrieval parameter-selection target (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeFor {
    Speed,
    Balanced,
    Accuracy,
}
