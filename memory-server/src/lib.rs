//! Typed in-process dispatch for the memory orchestration core's public
//! tools (§6): one function per tool name, reached through [`McpServer::dispatch`]
//! by the JSON-RPC-over-stdio binary in `src/bin/memory-server.rs`.
//!
//! This is deliberately not a generic JSON-RPC/MCP protocol stack — the
//! specification's §1 Non-goals put the outer tool-surface multiplexer out
//! of scope. `McpServer` is a second composition root (alongside
//! [`memory_core::Orchestrator`]): it holds the same injected
//! `VectorStore`/`EmbeddingClient`/`CompletionClient`/`MemoryCache`
//! dependencies the Orchestrator does, plus the `Classifier`,
//! `ContentProcessor`, `RetrievalEngine` and `IndexOptimizer` instances that
//! a handful of the ten tools need to call directly rather than through
//! `store_memory`/`handle_utterance`.

pub mod jsonrpc;

use memory_core::cache::MemoryCache;
use memory_core::classifier::{ClassificationContext, Classifier};
use memory_core::completion::CompletionClient;
use memory_core::content::{ContentProcessor, ContentType};
use memory_core::embeddings::EmbeddingClient;
use memory_core::error::Error as CoreError;
use memory_core::events::{Event, EventStream, EventSubscription, SubscriptionScope};
use memory_core::indexing::{IndexOptimizer, IndexStats};
use memory_core::orchestrator::{
    content_type_for, HandleUtteranceRequest, Orchestrator, StoreMemoryRequest, MEMORIES_TABLE,
};
use memory_core::retrieval::{RetrievalEngine, RetrievalOutcome, RetrievalQuery};
use memory_core::storage::{FilterExpr, VectorStore};
use memory_core::types::{MemoryPath, OptimizeFor};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The ten stable tool names of §6, plus the two operational aliases this
/// implementation recognizes (`process_user_prompt` is a wire-name alias
/// for `handle_utterance`; `health` is the `/health`-equivalent check).
pub const TOOL_NAMES: &[&str] = &[
    "store_memory",
    "retrieve_memories",
    "get_context",
    "generate_contextual_response",
    "handle_utterance",
    "process_user_prompt",
    "analyze_content",
    "get_memory_stats",
    "optimize_vector_index",
    "get_index_performance_stats",
    "subscribe_memory_updates",
    "health",
];

/// Errors a tool dispatch can surface over JSON-RPC. Distinct from
/// [`memory_core::Error`] so an unknown method or malformed params can be
/// reported without inventing a core error variant for a transport concern.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ServerError {
    /// A JSON-RPC error code: standard `-32602`/`-32601` for the transport
    /// concerns, and the core error's recoverability folded into `-32000`
    /// (recoverable) vs. `-32001` (not) for everything else.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            ServerError::UnknownTool(_) => -32601,
            ServerError::InvalidParams(_) => -32602,
            ServerError::Core(e) if e.is_recoverable() => -32000,
            ServerError::Core(_) => -32001,
        }
    }
}

/// The composition root for the dispatch layer: the same injected
/// dependencies [`Orchestrator`] takes, plus the components a few tools
/// bypass the Orchestrator to call directly.
pub struct McpServer {
    orchestrator: Orchestrator,
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    classifier: Classifier,
    content_processor: ContentProcessor,
    retrieval: RetrievalEngine,
    index_optimizer: IndexOptimizer,
    events: Arc<EventStream>,
    subscriptions: Mutex<HashMap<Uuid, EventSubscription>>,
}

impl McpServer {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        cache: Arc<dyn MemoryCache>,
        events: Arc<EventStream>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(store.clone(), embeddings.clone(), completion.clone(), cache, events.clone()),
            retrieval: RetrievalEngine::new(store.clone(), embeddings.clone()),
            index_optimizer: IndexOptimizer::new(store.clone()),
            store,
            embeddings,
            completion,
            classifier: Classifier::new(),
            content_processor: ContentProcessor::new(),
            events,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Dispatch one tool call by name, returning its JSON result.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UnknownTool`] for a name outside [`TOOL_NAMES`],
    /// [`ServerError::InvalidParams`] if `params` doesn't fit the tool's
    /// request shape, and [`ServerError::Core`] if the underlying pipeline
    /// call fails.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ServerError> {
        match method {
            "store_memory" => self.store_memory(parse(params)?).await,
            "retrieve_memories" => self.retrieve_memories(parse(params)?).await,
            "get_context" => self.get_context(parse(params)?).await,
            "generate_contextual_response" => self.generate_contextual_response(parse(params)?).await,
            "handle_utterance" | "process_user_prompt" => self.handle_utterance(parse(params)?).await,
            "analyze_content" => self.analyze_content(parse(params)?),
            "get_memory_stats" => self.get_memory_stats(parse(params)?).await,
            "optimize_vector_index" => self.optimize_vector_index(parse(params)?).await,
            "get_index_performance_stats" => self.get_index_performance_stats(parse(params)?).await,
            "subscribe_memory_updates" => self.subscribe_memory_updates(parse(params)?).await,
            "health" => Ok(self.health()),
            other => Err(ServerError::UnknownTool(other.to_string())),
        }
    }

    fn health(&self) -> Value {
        json!({ "status": "ok", "tools": TOOL_NAMES })
    }

    // -- store_memory (§4.6.1) ------------------------------------------

    async fn store_memory(&self, req: StoreMemoryParams) -> Result<Value, ServerError> {
        let result = self
            .orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: req.user_id,
                session_id: req.session_id,
                content: req.content,
                type_path: req.type_path,
                metadata: req.metadata.unwrap_or_default(),
            })
            .await?;

        Ok(json!({
            "stored": result.stored,
            "reason": result.reason,
            "memory_id": result.memory_id,
            "memory_type": result.memory_type,
            "importance": result.importance,
            "classification": result.classification,
            "storage_strategy": result.storage_strategy,
            "rag_stored": result.rag_stored,
            "rag_error": result.rag_error,
        }))
    }

    // -- retrieve_memories (§4.4) ----------------------------------------

    async fn retrieve_memories(&self, req: RetrieveMemoriesParams) -> Result<Value, ServerError> {
        let limit = req.limit.unwrap_or(10);
        let optimize_for = req.optimize_for.unwrap_or(OptimizeFor::Balanced);
        let filters = RetrievalEngine::scoped_filters(&req.user_id, req.session_id.map_or_else(Vec::new, |s| {
            vec![FilterExpr::Eq("session_id".to_string(), json!(s))]
        }));

        let outcome = self
            .retrieval
            .retrieve(&RetrievalQuery {
                table: MEMORIES_TABLE.to_string(),
                query_text: req.query,
                filters,
                limit,
                optimize_for,
            })
            .await?;

        Ok(match outcome {
            RetrievalOutcome::Found { items, performance } => json!({
                "items": items,
                "performance": performance,
                "degraded": false,
            }),
            RetrievalOutcome::EmbeddingUnavailable => json!({
                "items": Vec::<Value>::new(),
                "performance": Value::Null,
                "degraded": true,
            }),
        })
    }

    // -- get_context (§4.6.2 "build_context_prompt") ---------------------

    async fn get_context(&self, req: GetContextParams) -> Result<Value, ServerError> {
        let limit = req.limit.unwrap_or(5);
        let filters = RetrievalEngine::scoped_filters(&req.user_id, Vec::new());
        let outcome = self
            .retrieval
            .retrieve(&RetrievalQuery {
                table: MEMORIES_TABLE.to_string(),
                query_text: req.query,
                filters,
                limit,
                optimize_for: OptimizeFor::Balanced,
            })
            .await?;

        let (context, degraded) = match outcome {
            RetrievalOutcome::Found { items, .. } => {
                let joined = items.iter().map(|m| format!("- {}", m.content)).collect::<Vec<_>>().join("\n");
                (joined, false)
            }
            RetrievalOutcome::EmbeddingUnavailable => (String::new(), true),
        };

        Ok(json!({ "context": context, "degraded": degraded }))
    }

    // -- generate_contextual_response ------------------------------------

    async fn generate_contextual_response(&self, req: GenerateResponseParams) -> Result<Value, ServerError> {
        let filters = RetrievalEngine::scoped_filters(&req.user_id, Vec::new());
        let outcome = self
            .retrieval
            .retrieve(&RetrievalQuery {
                table: MEMORIES_TABLE.to_string(),
                query_text: req.prompt.clone(),
                filters,
                limit: req.context_limit.unwrap_or(5),
                optimize_for: OptimizeFor::Balanced,
            })
            .await?;

        let (context_lines, degraded) = match outcome {
            RetrievalOutcome::Found { items, .. } => {
                (items.iter().map(|m| m.content.clone()).collect::<Vec<_>>(), false)
            }
            RetrievalOutcome::EmbeddingUnavailable => (Vec::new(), true),
        };

        let prompt = if context_lines.is_empty() {
            req.prompt.clone()
        } else {
            format!("Context:\n{}\n\nUser: {}", context_lines.join("\n"), req.prompt)
        };

        let response = self.completion.complete(&prompt).await?;
        Ok(json!({ "response": response, "degraded": degraded }))
    }

    // -- handle_utterance / process_user_prompt (§4.6.2) -----------------

    async fn handle_utterance(&self, req: HandleUtteranceParams) -> Result<Value, ServerError> {
        let result = self
            .orchestrator
            .handle_utterance(HandleUtteranceRequest {
                user_id: req.user_id,
                session_id: req.session_id,
                prompt: req.prompt,
                auto_store: req.auto_store.unwrap_or(true),
                generate_response: req.generate_response.unwrap_or(true),
            })
            .await;

        let actions: Vec<Value> = result
            .actions_taken
            .iter()
            .map(|a| match a {
                memory_core::orchestrator::ActionTaken::Retrieval { items_found, degraded } => {
                    json!({ "type": "retrieval", "items_found": items_found, "degraded": degraded })
                }
                memory_core::orchestrator::ActionTaken::StoredPrompt { memory_id, stored } => {
                    json!({ "type": "stored_prompt", "memory_id": memory_id, "stored": stored })
                }
                memory_core::orchestrator::ActionTaken::StoredResponse { memory_id } => {
                    json!({ "type": "stored_response", "memory_id": memory_id })
                }
            })
            .collect();

        Ok(json!({
            "success": result.success,
            "response": result.response,
            "understanding": {
                "classification": result.understanding.classification,
                "intent": result.understanding.intent.as_str(),
            },
            "memory_plan": {
                "needs_retrieval": result.memory_plan.needs_retrieval,
                "auto_store": result.memory_plan.auto_store,
            },
            "actions_taken": actions,
            "duration_ms": result.duration_ms,
            "error": result.error,
            "error_type": result.error_type,
        }))
    }

    // -- analyze_content (§4.1, §4.2, no storage side effect) ------------

    fn analyze_content(&self, req: AnalyzeContentParams) -> Result<Value, ServerError> {
        let ctx = ClassificationContext::default();
        let classification = match &req.type_path {
            Some(path) => {
                let parsed = MemoryPath::parse(path)?;
                memory_core::types::MemoryClassification::new(parsed, 1.0)
            }
            None => self.classifier.classify(&req.content, &ctx),
        };
        let content_type = content_type_for(&classification.path.major_minor());
        let importance = self.classifier.importance(&classification);

        let processed = self.content_processor.process(&req.content, content_type, &classification);
        let (keywords, entities, will_store) = match processed {
            Ok(p) => (p.keywords, p.entities, p.importance_override.is_some() || matches!(content_type, ContentType::Conversation)),
            Err(_) => (Vec::new(), Vec::new(), false),
        };

        Ok(json!({
            "classification": classification,
            "importance": importance,
            "keywords": keywords,
            "entities": entities,
            "related_types": self.classifier.related_types(&classification),
            "would_store": will_store,
        }))
    }

    // -- get_memory_stats (§4.5 inputs) -----------------------------------

    async fn get_memory_stats(&self, req: MemoryStatsParams) -> Result<Value, ServerError> {
        let table = req.table.as_deref().unwrap_or(MEMORIES_TABLE);
        let info = self.store.describe_table(table).await?;
        let row_count = self.store.row_count(table).await.unwrap_or(0);
        let unique_users = self.store.unique_users(table).await.unwrap_or(0);

        Ok(json!({
            "table": table,
            "exists": info.is_some(),
            "dimension": info.as_ref().map(|i| i.dimension),
            "row_count": row_count,
            "unique_users": unique_users,
        }))
    }

    // -- optimize_vector_index (§4.5) -------------------------------------

    async fn optimize_vector_index(&self, req: OptimizeIndexParams) -> Result<Value, ServerError> {
        let table = req.table.as_deref().unwrap_or(MEMORIES_TABLE);
        let total_rows = self.store.row_count(table).await?;
        let unique_users = self.store.unique_users(table).await?;
        let stats = IndexStats { total_rows, unique_users };

        let strategy =
            self.index_optimizer.optimize(table, stats, req.power_users.unwrap_or(0), req.force.unwrap_or(false)).await?;

        Ok(json!({
            "table": table,
            "strategy": strategy_to_json(&strategy),
            "stats": { "total_rows": total_rows, "unique_users": unique_users },
        }))
    }

    // -- get_index_performance_stats (§4.5, read-only preview) ------------

    async fn get_index_performance_stats(&self, req: MemoryStatsParams) -> Result<Value, ServerError> {
        let table = req.table.as_deref().unwrap_or(MEMORIES_TABLE);
        let total_rows = self.store.row_count(table).await?;
        let unique_users = self.store.unique_users(table).await?;
        let stats = IndexStats { total_rows, unique_users };
        let recommended = IndexOptimizer::select_strategy(stats, 0);

        Ok(json!({
            "table": table,
            "stats": { "total_rows": total_rows, "unique_users": unique_users },
            "recommended_strategy": strategy_to_json(&recommended),
        }))
    }

    // -- subscribe_memory_updates (§4.7) ----------------------------------

    async fn subscribe_memory_updates(&self, req: SubscribeParams) -> Result<Value, ServerError> {
        let scope = match req.scope.as_str() {
            "user" => SubscriptionScope::User(req.id.clone().unwrap_or_default()),
            "session" => SubscriptionScope::Session(req.id.clone().unwrap_or_default()),
            "global" => SubscriptionScope::Global,
            other => return Err(ServerError::InvalidParams(format!("unknown scope {other:?}"))),
        };

        let subscription = self.events.subscribe(scope);
        let subscription_id = Uuid::new_v4();
        self.subscriptions.lock().await.insert(subscription_id, subscription);

        Ok(json!({ "subscription_id": subscription_id, "scope": req.scope }))
    }

    /// Drain at most `limit` pending events for a subscription created by
    /// `subscribe_memory_updates`. Not one of the ten wire tools — a
    /// request/response RPC call can't itself carry a server-push stream,
    /// so a transport that wants live delivery polls this instead (the
    /// pattern the teacher's MCP server uses for task/elicitation state).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidParams`] if `subscription_id` is
    /// unknown.
    pub async fn poll_subscription(&self, subscription_id: Uuid, limit: usize) -> Result<Vec<(Event, bool)>, ServerError> {
        let mut events = Vec::new();
        let mut subs = self.subscriptions.lock().await;
        let Some(sub) = subs.get_mut(&subscription_id) else {
            return Err(ServerError::InvalidParams(format!("unknown subscription {subscription_id}")));
        };
        while events.len() < limit {
            match tokio::time::timeout(std::time::Duration::from_millis(10), sub.recv()).await {
                Ok(Some(event)) => events.push(event),
                _ => break,
            }
        }
        Ok(events)
    }
}

fn strategy_to_json(strategy: &memory_core::IndexStrategy) -> Value {
    use memory_core::IndexStrategy;
    match strategy {
        IndexStrategy::None => json!({ "type": "none" }),
        IndexStrategy::IvfFlatBasic { lists, probes }
        | IndexStrategy::IvfFlatAccurate { lists, probes }
        | IndexStrategy::IvfFlatFast { lists, probes }
        | IndexStrategy::PartitionedIvfFlat { lists, probes } => {
            json!({ "type": strategy.type_name(), "lists": lists, "probes": probes })
        }
        IndexStrategy::Hnsw { m, ef_construction, ef_search } => {
            json!({ "type": "hnsw", "m": m, "ef_construction": ef_construction, "ef_search": ef_search })
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, ServerError> {
    serde_json::from_value(params).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct StoreMemoryParams {
    user_id: String,
    session_id: Option<String>,
    content: String,
    type_path: Option<String>,
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RetrieveMemoriesParams {
    user_id: String,
    session_id: Option<String>,
    query: String,
    limit: Option<usize>,
    optimize_for: Option<OptimizeFor>,
}

#[derive(Debug, Deserialize)]
struct GetContextParams {
    user_id: String,
    query: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseParams {
    user_id: String,
    prompt: String,
    context_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HandleUtteranceParams {
    user_id: String,
    session_id: String,
    prompt: String,
    auto_store: Option<bool>,
    generate_response: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeContentParams {
    content: String,
    type_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemoryStatsParams {
    table: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptimizeIndexParams {
    table: Option<String>,
    power_users: Option<u64>,
    force: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    scope: String,
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::cache::mock::InMemoryCache;
    use memory_core::completion::MockCompletionClient;
    use memory_core::embeddings::MockEmbeddingClient;
    use memory_core::storage::mock::InMemoryVectorStore;

    fn server() -> McpServer {
        McpServer::new(
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(MockEmbeddingClient::new(16)),
            Arc::new(MockCompletionClient),
            Arc::new(InMemoryCache::default()),
            Arc::new(EventStream::new()),
        )
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips_through_dispatch() {
        let server = server();
        let store_result = server
            .dispatch(
                "store_memory",
                json!({ "user_id": "u1", "content": "제 이름은 김철수입니다." }),
            )
            .await
            .unwrap();
        assert_eq!(store_result["stored"], json!(true));

        let retrieve_result = server
            .dispatch(
                "retrieve_memories",
                json!({ "user_id": "u1", "query": "이름이 뭐야?" }),
            )
            .await
            .unwrap();
        assert_eq!(retrieve_result["degraded"], json!(false));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let server = server();
        let err = server.dispatch("not_a_tool", json!({})).await.unwrap_err();
        assert_eq!(err.code(), -32601);
    }

    #[tokio::test]
    async fn analyze_content_does_not_store() {
        let server = server();
        let result = server.dispatch("analyze_content", json!({ "content": "저는 Rust를 좋아합니다." })).await.unwrap();
        assert!(result["classification"].is_object());

        let stats = server.dispatch("get_memory_stats", json!({})).await.unwrap();
        assert_eq!(stats["row_count"], json!(0));
    }

    #[tokio::test]
    async fn health_lists_tools() {
        let server = server();
        let result = server.dispatch("health", json!({})).await.unwrap();
        assert_eq!(result["status"], json!("ok"));
    }

    #[tokio::test]
    async fn subscribe_then_poll_observes_a_store() {
        let server = server();
        let sub = server.dispatch("subscribe_memory_updates", json!({ "scope": "user", "id": "u1" })).await.unwrap();
        let subscription_id: Uuid = serde_json::from_value(sub["subscription_id"].clone()).unwrap();

        server
            .dispatch("store_memory", json!({ "user_id": "u1", "content": "제 이름은 김철수입니다." }))
            .await
            .unwrap();

        let events = server.poll_subscription(subscription_id, 10).await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
