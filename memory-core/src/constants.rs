//! Magic numbers and string constants for the memory orchestration core.
//!
//! Centralizing these keeps the classifier's scoring arithmetic, the
//! strategy planner's policy table, and the index optimizer's thresholds
//! auditable in one place instead of scattered through the pipeline.

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Maximum number of keywords retained per processed memory (§4.2).
    pub const MAX_KEYWORDS: usize = 10;

    /// Cap applied to `fact` importance (§4.2).
    pub const FACT_IMPORTANCE_CAP: f32 = 9.0;

    /// Cap applied to `experience` importance (§4.2).
    pub const EXPERIENCE_IMPORTANCE_CAP: f32 = 9.0;

    /// Minimum word count for an `experience` utterance to be stored (§4.2).
    pub const MIN_EXPERIENCE_WORDS: usize = 10;

    /// Minimum keyword count for a `fact` utterance to be stored absent
    /// entities (§4.2).
    pub const MIN_FACT_KEYWORDS: usize = 3;

    /// Size (bytes) above which `knowledge/experience` content is archived
    /// and compressed rather than kept hot (§4.3).
    pub const LARGE_CONTENT_BYTES: usize = 1000;

    /// `max_length` for the Content Processor's summary policy (§4.2): the
    /// threshold below which content is returned unsummarized, and the cap
    /// a chosen sentence is truncated to above it.
    pub const SUMMARY_MAX_LENGTH: usize = 250;

    /// TTL applied to `temporal/context/*` and other CACHE-only memories
    /// (§4.3).
    pub const CACHE_TTL_SECONDS: u64 = 86_400;

    /// Ring-buffer size for the per-user conversation buffer (§4.6.2, §9).
    pub const CONVERSATION_BUFFER_SIZE: usize = 10;

    /// Bounded queue capacity for each event subscription (§4.7).
    pub const SUBSCRIPTION_QUEUE_CAPACITY: usize = 100;

    /// Row count below which the index optimizer recommends a sequential
    /// scan instead of any ANN index (§4.5).
    pub const INDEX_MIN_ROWS_IVFFLAT: u64 = 1_000;

    /// Row count below which `IndexOptimizer::should_optimize` refuses to
    /// run at all, independent of time-based throttling (§4.5).
    pub const INDEX_MIN_ROWS_TO_OPTIMIZE: u64 = 100;

    /// Minimum interval between non-forced optimizations of the same table
    /// (§4.5).
    pub const INDEX_OPTIMIZATION_COOLDOWN: Duration = Duration::from_secs(24 * 3600);

    /// Default deadline applied to every outbound call to a downstream
    /// service (§5).
    pub const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

    /// Max *retries* (beyond the initial attempt) for idempotent external
    /// reads (embed, `describe_table`) under the retry policy of §9, which
    /// caps reads at 3 attempts total. Writes get zero retries.
    pub const MAX_READ_RETRIES: u32 = 2;

    /// Base delay for the exponential backoff used by read retries.
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
}

/// Keys used in the free-form `metadata` bag, kept centralized so the
/// content processor, strategy planner, and retrieval engine agree on
/// field names without importing each other's internals.
pub mod metadata_keys {
    pub const STORAGE_FORMAT: &str = "storage_format";
    pub const CLASSIFICATION: &str = "classification";
    pub const ROLE: &str = "role";
    pub const INTENT: &str = "intent";
    pub const RAG_STORED: &str = "rag_stored";
}
