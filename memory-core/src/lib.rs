//! Memory orchestration core: hierarchical classification, content
//! extraction, storage strategy planning, vector retrieval, index
//! optimization, and the two public pipeline entry points
//! (`Orchestrator::store_memory`, `Orchestrator::handle_utterance`) for
//! conversational agent memory.
//!
//! This crate defines the seams (`VectorStore`, `EmbeddingClient`,
//! `CompletionClient`, `MemoryCache`) that backend crates implement —
//! `memory-storage-turso` for durable/RAG storage, `memory-storage-redb`
//! for the cache tier — and composes them, plus an `EventStream`, into
//! the [`orchestrator::Orchestrator`].

pub mod cache;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod constants;
pub mod content;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod indexing;
pub mod orchestrator;
pub mod retrieval;
pub mod retry;
pub mod storage;
pub mod strategy;
pub mod types;

pub use cache::MemoryCache;
pub use classifier::{Classifier, ClassificationContext};
pub use completion::CompletionClient;
pub use config::{AgentType, MemoryConfig};
pub use content::{ContentProcessor, ContentType, ProcessedContent};
pub use embeddings::EmbeddingClient;
pub use error::{Error, Result};
pub use events::{Event, EventStream, EventSubscription, EventType, SubscriptionScope};
pub use indexing::{IndexOptimizer, IndexStats, IndexStrategy};
pub use orchestrator::{
    HandleUtteranceRequest, HandleUtteranceResult, Orchestrator, StoreMemoryRequest, StoreMemoryResult,
};
pub use retrieval::{RetrievalEngine, RetrievalOutcome, RetrievalQuery};
pub use storage::{FilterExpr, IndexSpec, SearchHit, SearchParams, TableInfo, VectorRow, VectorStore};
pub use strategy::{Location, StorageStrategy, StrategyPlanner};
pub use types::{
    Entity, Major, Memory, MemoryClassification, MemoryPath, OptimizeFor, RetrievalPerformance, RetrievedMemory,
    StorageFormat,
};
