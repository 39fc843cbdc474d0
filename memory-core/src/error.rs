//! Error taxonomy for the memory orchestration core.

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds produced by the classifier, content processor, strategy
/// planner, retrieval engine, index optimizer, and orchestrator.
///
/// Kinds map directly onto the propagation policy of the specification:
/// some (`EmbeddingUnavailable`) are soft failures the orchestrator degrades
/// around, others (`StoreUnavailable` on a primary write) abort the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input shape, missing required field, or an out-of-range value.
    #[error("validation error: {0}")]
    Validation(String),

    /// The embedding service errored or timed out.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The completion service errored or timed out.
    #[error("completion service unavailable: {0}")]
    CompletionUnavailable(String),

    /// The vector store errored or timed out.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// A write carried an embedding whose length did not match the table's
    /// declared dimension. Internally recoverable by table re-creation
    /// (see [`crate::retrieval::RetrievalEngine::ensure_table`]).
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension declared by the table.
        expected: usize,
        /// Dimension of the vector that was rejected.
        actual: usize,
    },

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unclassified fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is recoverable via a retry with backoff.
    ///
    /// Writes are never retried at this layer (the downstream store is the
    /// retry authority); idempotent reads (embed, `describe_table`) are.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::CompletionUnavailable(_) | Error::StoreUnavailable(_)
        )
    }

    /// The stable `error_type` string surfaced in tool responses (§7).
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Error::CompletionUnavailable(_) => "CompletionUnavailable",
            Error::StoreUnavailable(_) => "StoreUnavailable",
            Error::DimensionMismatch { .. } => "DimensionMismatch",
            Error::Serialization(_) => "Internal",
            Error::Internal(_) => "Internal",
        }
    }
}
