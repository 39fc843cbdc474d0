//! Orchestrator (C6): the façade that sequences C1→C2→C3→(C4)→(generate)→
//! (store) into the two public operations `store_memory` and
//! `handle_utterance`, and emits events (§4.6).

use crate::cache::MemoryCache;
use crate::classifier::{ClassificationContext, Classifier};
use crate::completion::CompletionClient;
use crate::constants::defaults;
use crate::content::{ContentProcessor, ContentType};
use crate::embeddings::EmbeddingClient;
use crate::error::{Error, Result};
use crate::events::{Event, EventStream, EventType, SubscriptionScope};
use crate::retrieval::{RetrievalEngine, RetrievalOutcome, RetrievalQuery};
use crate::storage::VectorStore;
use crate::strategy::{Location, StorageStrategy, StrategyPlanner};
use crate::types::{Memory, MemoryClassification, MemoryPath, OptimizeFor, RetrievedMemory};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// The primary vector table name every memory is written to (§6
/// "Persisted layout").
pub const MEMORIES_TABLE: &str = "memories";

/// Resolve the [`ContentType`] the Content Processor dispatches on for a
/// given `major/minor` prefix. `personal/profession` and `temporal/context`
/// have no dedicated per-type policy in §4.2; they fall back to the `fact`
/// policy (store only if the utterance carries enough signal), the most
/// conservative of the six, which is this implementation's resolution of
/// that gap.
#[must_use]
pub fn content_type_for(major_minor: &str) -> ContentType {
    match major_minor {
        "personal/identity" => ContentType::Identity,
        "personal/preference" => ContentType::Preference,
        "knowledge/skill" => ContentType::Skill,
        "knowledge/experience" => ContentType::Experience,
        "temporal/conversation" => ContentType::Conversation,
        _ => ContentType::Fact,
    }
}

/// Input to [`Orchestrator::store_memory`] (§4.6.1).
#[derive(Debug, Clone, Default)]
pub struct StoreMemoryRequest {
    pub user_id: String,
    pub session_id: Option<String>,
    pub content: String,
    /// An explicit type path, bypassing the classifier (§4.6.1 step 1).
    pub type_path: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Result of [`Orchestrator::store_memory`] (§4.6.1).
#[derive(Debug, Clone)]
pub struct StoreMemoryResult {
    pub stored: bool,
    pub reason: Option<String>,
    pub memory_id: Option<uuid::Uuid>,
    pub memory_type: Option<String>,
    pub importance: Option<f32>,
    pub classification: Option<MemoryClassification>,
    pub storage_strategy: Option<StorageStrategy>,
    /// `None` when the strategy never attempted a RAG write; `Some(false)`
    /// with an error when the best-effort RAG write failed (§4.6.1, §7).
    pub rag_stored: Option<bool>,
    pub rag_error: Option<String>,
}

impl StoreMemoryResult {
    fn not_stored(reason: &str) -> Self {
        Self {
            stored: false,
            reason: Some(reason.to_string()),
            memory_id: None,
            memory_type: None,
            importance: None,
            classification: None,
            storage_strategy: None,
            rag_stored: None,
            rag_error: None,
        }
    }
}

/// Conversational intent derived in §4.6.2 step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    RecallPrevious,
    Question,
    InformationSharing,
    Greeting,
    Conversation,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::RecallPrevious => "recall_previous",
            Intent::Question => "question",
            Intent::InformationSharing => "information_sharing",
            Intent::Greeting => "greeting",
            Intent::Conversation => "conversation",
        }
    }
}

const RECALL_MARKERS: &[&str] = &["방금", "아까", "just now", "earlier", "전에 말"];
const GREETING_MARKERS: &[&str] = &["안녕", "반가", "hello", "hi"];

/// Derive intent from a classification plus heuristic temporal markers
/// (§4.6.2 step 1).
#[must_use]
fn analyze_intent(content: &str, classification: &MemoryClassification) -> Intent {
    let lower = content.to_lowercase();
    if RECALL_MARKERS.iter().any(|m| lower.contains(m)) {
        return Intent::RecallPrevious;
    }
    if GREETING_MARKERS.iter().any(|m| lower.contains(m)) || classification.path.detail == "greeting" {
        return Intent::Greeting;
    }
    if content.contains('?') || classification.path.detail == "question" {
        return Intent::Question;
    }
    match classification.path.major {
        crate::types::Major::Personal | crate::types::Major::Knowledge => Intent::InformationSharing,
        crate::types::Major::Temporal => Intent::Conversation,
    }
}

/// One entry of the per-user conversation ring buffer (§4.6.2 step 6, §9).
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub message: String,
    pub response: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
    pub intent: Intent,
}

/// Running per-user interaction statistics (§4.6.2 step 5).
#[derive(Debug, Clone, Default)]
pub struct UserModel {
    pub interaction_count: u64,
    pub common_intents: HashMap<&'static str, u64>,
    pub avg_message_length: f32,
    pub question_frequency: f32,
}

impl UserModel {
    fn record(&mut self, content: &str, intent: Intent) {
        self.interaction_count += 1;
        *self.common_intents.entry(intent.as_str()).or_insert(0) += 1;
        let n = self.interaction_count as f32;
        let len = content.chars().count() as f32;
        self.avg_message_length += (len - self.avg_message_length) / n;
        let is_question = f32::from(u8::from(intent == Intent::Question));
        self.question_frequency += (is_question - self.question_frequency) / n;
    }
}

#[derive(Default)]
struct UserState {
    buffer: VecDeque<ConversationEntry>,
    model: UserModel,
    context: ClassificationContext,
}

/// One action the pipeline took, surfaced in `actions_taken` (§4.6.2 step 8).
#[derive(Debug, Clone)]
pub enum ActionTaken {
    Retrieval { items_found: usize, degraded: bool },
    StoredPrompt { memory_id: Option<uuid::Uuid>, stored: bool },
    StoredResponse { memory_id: Option<uuid::Uuid> },
}

/// `decisions.understanding` in [`HandleUtteranceResult`] (§4.6.2 step 8).
#[derive(Debug, Clone)]
pub struct UnderstandingDecision {
    pub classification: MemoryClassification,
    pub intent: Intent,
}

/// `decisions.memory_plan` in [`HandleUtteranceResult`] (§4.6.2 step 8).
#[derive(Debug, Clone)]
pub struct MemoryPlanDecision {
    pub needs_retrieval: bool,
    pub auto_store: bool,
}

/// Result of [`Orchestrator::handle_utterance`] (§4.6.2).
#[derive(Debug, Clone)]
pub struct HandleUtteranceResult {
    pub success: bool,
    pub response: Option<String>,
    pub understanding: UnderstandingDecision,
    pub memory_plan: MemoryPlanDecision,
    pub actions_taken: Vec<ActionTaken>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_type: Option<&'static str>,
}

/// Input to [`Orchestrator::handle_utterance`] (§4.6.2).
#[derive(Debug, Clone)]
pub struct HandleUtteranceRequest {
    pub user_id: String,
    pub session_id: String,
    pub prompt: String,
    pub auto_store: bool,
    pub generate_response: bool,
}

/// Dependencies injected into the Orchestrator — the composition root named
/// in §9 ("Global state... becomes explicit composition roots"): no module
/// reaches for a singleton, everything the pipeline needs arrives here.
pub struct Orchestrator {
    classifier: Classifier,
    content_processor: ContentProcessor,
    strategy_planner: StrategyPlanner,
    retrieval: RetrievalEngine,
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    cache: Arc<dyn MemoryCache>,
    events: Arc<EventStream>,
    users: Mutex<HashMap<String, UserState>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        cache: Arc<dyn MemoryCache>,
        events: Arc<EventStream>,
    ) -> Self {
        Self {
            classifier: Classifier::new(),
            content_processor: ContentProcessor::new(),
            strategy_planner: StrategyPlanner::new(),
            retrieval: RetrievalEngine::new(store.clone(), embeddings.clone()),
            store,
            embeddings,
            completion,
            cache,
            events,
            users: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn subscribe(&self, scope: SubscriptionScope) -> crate::events::EventSubscription {
        self.events.subscribe(scope)
    }

    /// §4.6.1: classify (if needed), process, plan, write, index, emit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty utterance or user id, and
    /// [`Error::StoreUnavailable`] if the primary DB write fails (§7 — no
    /// partial rollback is attempted). A RAG secondary-write failure is
    /// reported in the result, not as an `Err` (§4.6.1, §7).
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn store_memory(&self, request: StoreMemoryRequest) -> Result<StoreMemoryResult> {
        if request.user_id.trim().is_empty() {
            return Err(Error::Validation("user_id must not be empty".to_string()));
        }
        if request.content.trim().is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }

        let classification = match &request.type_path {
            Some(path) => MemoryClassification::new(MemoryPath::parse(path)?, 1.0),
            None => {
                let ctx = self.session_context(&request.user_id, request.session_id.as_deref());
                self.classifier.classify(&request.content, &ctx)
            }
        };
        self.remember_classification(&request.user_id, request.session_id.as_deref(), &classification);

        let content_type = content_type_for(&classification.path.major_minor());
        let processed = self.content_processor.process(&request.content, content_type, &classification)?;

        let Some(importance) = processed.importance_override else {
            return Ok(StoreMemoryResult::not_stored("not significant"));
        };

        let persisted_content = match &processed.structured_content {
            Some(value) => value.to_string(),
            None => processed.summary.clone().unwrap_or_else(|| processed.content.clone()),
        };
        let strategy = self
            .strategy_planner
            .plan(&classification.path, importance, persisted_content.len());

        let memory_id = uuid::Uuid::new_v4();
        let now = Utc::now();
        let original_content = if persisted_content == request.content {
            None
        } else {
            Some(request.content.clone())
        };

        let mut metadata = request.metadata.clone();
        metadata.insert(crate::constants::metadata_keys::ROLE.to_string(), serde_json::json!("user"));
        metadata.insert(
            crate::constants::metadata_keys::STORAGE_FORMAT.to_string(),
            serde_json::json!(format!("{:?}", processed.storage_format).to_lowercase()),
        );

        let embedding = if strategy.includes_embedding {
            self.embeddings
                .embed(&persisted_content)
                .await
                .map(|r| r.embedding)?
        } else {
            Vec::new()
        };

        let memory = Memory {
            id: memory_id,
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            memory_type: classification.path.clone(),
            content: persisted_content.clone(),
            original_content,
            importance,
            embedding: embedding.clone(),
            keywords: processed.keywords.clone(),
            entities: processed.entities.clone(),
            metadata,
            created_at: now,
            updated_at: now,
        };
        memory.validate()?;

        match strategy.primary {
            Location::Db => self.write_db(&memory).await?,
            Location::Cache => self.write_cache(&memory, strategy.ttl_seconds).await?,
            Location::RagIndex | Location::Archive => self.write_db(&memory).await?,
        }

        let (rag_stored, rag_error) = if strategy.includes_rag {
            match self.write_rag(&memory).await {
                Ok(()) => (Some(true), None),
                Err(e) => {
                    tracing::warn!(error = %e, memory_id = %memory_id, "rag secondary write failed");
                    (Some(false), Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        let mut created_event = Event::new(EventType::MemoryCreated, request.user_id.clone())
            .with_memory(memory_id, classification.path.to_path())
            .with_content(memory.content.clone());
        if let Some(session_id) = &request.session_id {
            created_event = created_event.with_session(session_id.clone());
        }
        self.events.publish(created_event);

        Ok(StoreMemoryResult {
            stored: true,
            reason: None,
            memory_id: Some(memory_id),
            memory_type: Some(classification.path.to_path()),
            importance: Some(importance),
            classification: Some(classification),
            storage_strategy: Some(strategy),
            rag_stored,
            rag_error,
        })
    }

    async fn write_db(&self, memory: &Memory) -> Result<()> {
        self.retrieval.ensure_table(MEMORIES_TABLE).await?;
        self.store.insert(MEMORIES_TABLE, &to_row(memory)).await
    }

    async fn write_cache(&self, memory: &Memory, ttl_seconds: Option<u64>) -> Result<()> {
        let ttl = ttl_seconds.map(std::time::Duration::from_secs);
        let key = format!("{}:{}", memory.user_id, memory.id);
        let value = serde_json::json!({
            "content": memory.content,
            "memory_type": memory.memory_type.to_path(),
            "importance": memory.importance,
            "created_at": memory.created_at,
        });
        self.cache.set(&key, value, ttl).await
    }

    /// Index the processed content in the RAG table, namespaced by
    /// `user_id/type`, using the memory id as the document id (§4.6.1 step
    /// 6). Best-effort: failures are surfaced in the result, not this
    /// function's `Result` (the caller already logs before returning).
    async fn write_rag(&self, memory: &Memory) -> Result<()> {
        let namespace = format!("rag_{}_{}", memory.user_id, memory.memory_type.major_minor().replace('/', "_"));
        self.retrieval.ensure_table(&namespace).await?;
        self.store.insert(&namespace, &to_row(memory)).await
    }

    /// §4.6.2: intent analysis → conditional retrieval → optional
    /// generation → optional storage → user-model/buffer update → events.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, session_id = %request.session_id))]
    pub async fn handle_utterance(&self, request: HandleUtteranceRequest) -> HandleUtteranceResult {
        let start = Instant::now();

        if request.user_id.trim().is_empty() || request.prompt.trim().is_empty() {
            return HandleUtteranceResult {
                success: false,
                response: None,
                understanding: UnderstandingDecision {
                    classification: MemoryClassification::new(MemoryPath::fallback(), 0.0),
                    intent: Intent::Conversation,
                },
                memory_plan: MemoryPlanDecision { needs_retrieval: false, auto_store: false },
                actions_taken: vec![],
                duration_ms: start.elapsed().as_millis() as u64,
                error: Some("user_id and prompt must not be empty".to_string()),
                error_type: Some("ValidationError"),
            };
        }

        let ctx = self.session_context(&request.user_id, Some(request.session_id.as_str()));
        let classification = self.classifier.classify(&request.prompt, &ctx);
        let intent = analyze_intent(&request.prompt, &classification);
        self.remember_classification(&request.user_id, Some(request.session_id.as_str()), &classification);

        let needs_retrieval = matches!(intent, Intent::RecallPrevious | Intent::Question);
        let mut actions_taken = Vec::new();
        let mut retrieved: Vec<RetrievedMemory> = Vec::new();
        let mut retrieval_degraded = false;

        if needs_retrieval {
            let optimize_for = if intent == Intent::RecallPrevious { OptimizeFor::Accuracy } else { OptimizeFor::Balanced };
            let query = RetrievalQuery {
                table: MEMORIES_TABLE.to_string(),
                query_text: request.prompt.clone(),
                filters: RetrievalEngine::scoped_filters(&request.user_id, vec![]),
                limit: 8,
                optimize_for,
            };
            match self.retrieval.retrieve(&query).await {
                Ok(RetrievalOutcome::Found { items, .. }) => {
                    actions_taken.push(ActionTaken::Retrieval { items_found: items.len(), degraded: false });
                    retrieved = items;
                }
                Ok(RetrievalOutcome::EmbeddingUnavailable) => {
                    retrieval_degraded = true;
                    actions_taken.push(ActionTaken::Retrieval { items_found: 0, degraded: true });
                }
                Err(e) => {
                    return self.fail(start, classification, intent, needs_retrieval, request.auto_store, &e);
                }
            }
        }

        let response = if request.generate_response {
            let prompt = self.build_context_prompt(&request.prompt, &retrieved, intent, classification.path.clone());
            match self.completion.complete(&prompt).await {
                Ok(text) => Some(text),
                Err(e) => {
                    return HandleUtteranceResult {
                        success: false,
                        response: None,
                        understanding: UnderstandingDecision { classification, intent },
                        memory_plan: MemoryPlanDecision { needs_retrieval, auto_store: request.auto_store },
                        actions_taken,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: Some(e.to_string()),
                        error_type: Some(e.error_type()),
                    };
                }
            }
        } else {
            None
        };

        if request.auto_store {
            let store_request = StoreMemoryRequest {
                user_id: request.user_id.clone(),
                session_id: Some(request.session_id.clone()),
                content: request.prompt.clone(),
                type_path: None,
                metadata: HashMap::new(),
            };
            match self.store_memory(store_request).await {
                Ok(result) => {
                    actions_taken.push(ActionTaken::StoredPrompt { memory_id: result.memory_id, stored: result.stored });

                    if result.stored && result.importance.unwrap_or(0.0) >= 4.0 {
                        if let Some(response_text) = &response {
                            let response_request = StoreMemoryRequest {
                                user_id: request.user_id.clone(),
                                session_id: Some(request.session_id.clone()),
                                content: response_text.clone(),
                                type_path: Some("temporal/conversation/response".to_string()),
                                metadata: HashMap::new(),
                            };
                            if let Ok(response_result) = self.store_memory(response_request).await {
                                actions_taken.push(ActionTaken::StoredResponse { memory_id: response_result.memory_id });
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "prompt storage failed during handle_utterance");
                }
            }
        }

        self.update_user_state(&request.user_id, &request.prompt, response.clone(), intent);

        HandleUtteranceResult {
            success: true,
            response,
            understanding: UnderstandingDecision { classification, intent },
            memory_plan: MemoryPlanDecision { needs_retrieval: needs_retrieval && !retrieval_degraded, auto_store: request.auto_store },
            actions_taken,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
            error_type: None,
        }
    }

    fn fail(
        &self,
        start: Instant,
        classification: MemoryClassification,
        intent: Intent,
        needs_retrieval: bool,
        auto_store: bool,
        error: &Error,
    ) -> HandleUtteranceResult {
        HandleUtteranceResult {
            success: false,
            response: None,
            understanding: UnderstandingDecision { classification, intent },
            memory_plan: MemoryPlanDecision { needs_retrieval, auto_store },
            actions_taken: vec![],
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(error.to_string()),
            error_type: Some(error.error_type()),
        }
    }

    /// Build the structured prompt of §4.6.2 step 3: recent conversations,
    /// grouped user information, the current message, detected intent,
    /// importance, and an intent-specific instruction block.
    fn build_context_prompt(
        &self,
        message: &str,
        retrieved: &[RetrievedMemory],
        intent: Intent,
        path: MemoryPath,
    ) -> String {
        let mut prompt = String::new();

        let mut conversations: Vec<&RetrievedMemory> = Vec::new();
        let mut others: Vec<&RetrievedMemory> = Vec::new();
        for item in retrieved {
            let is_conversation = item
                .metadata
                .get("memory_type")
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.starts_with("temporal"));
            if is_conversation {
                conversations.push(item);
            } else {
                others.push(item);
            }
        }

        if !conversations.is_empty() {
            prompt.push_str("=== Recent Conversations ===\n");
            for item in &conversations {
                prompt.push_str(&format!("- {}\n", item.content));
            }
        }
        if !others.is_empty() {
            prompt.push_str("=== User Information ===\n");
            for item in &others {
                prompt.push_str(&format!("- {}\n", item.content));
            }
        }

        prompt.push_str(&format!("\nCurrent message: {message}\n"));
        prompt.push_str(&format!("Detected intent: {}\n", intent.as_str()));
        prompt.push_str(&format!("Memory type: {}\n", path.to_path()));
        prompt.push_str(match intent {
            Intent::RecallPrevious => "Instruction: answer using the recalled information above, citing it directly.\n",
            Intent::Question => "Instruction: answer the question concisely using any relevant context above.\n",
            Intent::Greeting => "Instruction: greet the user back warmly and briefly.\n",
            Intent::InformationSharing => "Instruction: acknowledge the shared information.\n",
            Intent::Conversation => "Instruction: continue the conversation naturally.\n",
        });
        prompt
    }

    fn session_context(&self, user_id: &str, session_id: Option<&str>) -> ClassificationContext {
        let key = Self::user_key(user_id, session_id);
        self.users.lock().get(&key).map(|s| s.context.clone()).unwrap_or_default()
    }

    fn remember_classification(&self, user_id: &str, session_id: Option<&str>, classification: &MemoryClassification) {
        let key = Self::user_key(user_id, session_id);
        let mut users = self.users.lock();
        let state = users.entry(key).or_default();
        let path = classification.path.to_path();
        state.context.previous_type = Some(path.clone());
        state.context.session_types.push(path);
        if state.context.session_types.len() > 5 {
            state.context.session_types.remove(0);
        }
    }

    fn update_user_state(&self, user_id: &str, message: &str, response: Option<String>, intent: Intent) {
        let key = Self::user_key(user_id, None);
        let mut users = self.users.lock();
        let state = users.entry(key).or_default();
        state.model.record(message, intent);
        state.buffer.push_back(ConversationEntry {
            message: message.to_string(),
            response,
            timestamp: Utc::now(),
            intent,
        });
        while state.buffer.len() > defaults::CONVERSATION_BUFFER_SIZE {
            state.buffer.pop_front();
        }
    }

    fn user_key(user_id: &str, session_id: Option<&str>) -> String {
        match session_id {
            Some(s) => format!("{user_id}:{s}"),
            None => user_id.to_string(),
        }
    }

    /// Snapshot of a user's conversation buffer, for `get_context` callers.
    #[must_use]
    pub fn conversation_buffer(&self, user_id: &str) -> Vec<ConversationEntry> {
        self.users
            .lock()
            .get(&Self::user_key(user_id, None))
            .map(|s| s.buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a user's running interaction statistics.
    #[must_use]
    pub fn user_model(&self, user_id: &str) -> UserModel {
        self.users
            .lock()
            .get(&Self::user_key(user_id, None))
            .map(|s| s.model.clone())
            .unwrap_or_default()
    }
}

fn to_row(memory: &Memory) -> crate::storage::VectorRow {
    crate::storage::VectorRow {
        id: memory.id,
        content: memory.content.clone(),
        embedding: memory.embedding.clone(),
        metadata: {
            let mut m = memory.metadata.clone();
            m.insert("memory_type".to_string(), serde_json::json!(memory.memory_type.to_path()));
            m.insert("keywords".to_string(), serde_json::json!(memory.keywords));
            m.insert(
                "entities".to_string(),
                serde_json::to_value(&memory.entities).unwrap_or(serde_json::Value::Null),
            );
            m
        },
        user_id: memory.user_id.clone(),
        session_id: memory.session_id.clone(),
        memory_type: Some(memory.memory_type.to_path()),
        importance: memory.importance,
        created_at: memory.created_at,
        updated_at: memory.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::InMemoryCache;
    use crate::completion::MockCompletionClient;
    use crate::embeddings::MockEmbeddingClient;
    use crate::storage::mock::InMemoryVectorStore;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(MockEmbeddingClient::new(16)),
            Arc::new(MockCompletionClient),
            Arc::new(InMemoryCache::default()),
            Arc::new(EventStream::new()),
        )
    }

    #[tokio::test]
    async fn store_memory_persists_identity_at_importance_nine() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: "u1".to_string(),
                session_id: Some("s1".to_string()),
                content: "제 이름은 김철수입니다.".to_string(),
                type_path: None,
                metadata: HashMap::new(),
            })
            .await
            .unwrap();
        assert!(result.stored);
        assert_eq!(result.importance, Some(9.0));
        assert_eq!(result.memory_type, Some("personal/identity/name".to_string()));
    }

    #[tokio::test]
    async fn store_memory_drops_insignificant_fact() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: "u1".to_string(),
                session_id: None,
                content: "음".to_string(),
                type_path: Some("knowledge/fact/general".to_string()),
                metadata: HashMap::new(),
            })
            .await
            .unwrap();
        assert!(!result.stored);
        assert!(result.reason.is_some());
    }

    #[tokio::test]
    async fn store_memory_rejects_empty_user_id() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: String::new(),
                session_id: None,
                content: "hello".to_string(),
                type_path: None,
                metadata: HashMap::new(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn store_memory_emits_a_memory_created_event() {
        let orchestrator = orchestrator();
        let mut sub = orchestrator.subscribe(SubscriptionScope::User("u1".to_string()));
        orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: "u1".to_string(),
                session_id: None,
                content: "제 이름은 김철수입니다.".to_string(),
                type_path: None,
                metadata: HashMap::new(),
            })
            .await
            .unwrap();
        let (event, _gap) = sub.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::MemoryCreated);
        assert_eq!(event.user_id, "u1");
    }

    #[tokio::test]
    async fn handle_utterance_rejects_empty_prompt() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_utterance(HandleUtteranceRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                prompt: "   ".to_string(),
                auto_store: false,
                generate_response: false,
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.error_type, Some("ValidationError"));
    }

    #[tokio::test]
    async fn handle_utterance_generates_a_response_without_storing_by_default() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_utterance(HandleUtteranceRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                prompt: "안녕하세요".to_string(),
                auto_store: false,
                generate_response: true,
            })
            .await;
        assert!(result.success);
        assert!(result.response.is_some());
        // The ring buffer tracks conversational turns regardless of
        // `auto_store`; only `store_memory` persistence is gated by it.
        assert_eq!(orchestrator.conversation_buffer("u1").len(), 1);
    }

    #[tokio::test]
    async fn handle_utterance_recall_marker_triggers_retrieval() {
        let orchestrator = orchestrator();
        orchestrator
            .store_memory(StoreMemoryRequest {
                user_id: "u1".to_string(),
                session_id: Some("s1".to_string()),
                content: "저는 Python 개발자입니다.".to_string(),
                type_path: None,
                metadata: HashMap::new(),
            })
            .await
            .unwrap();

        let result = orchestrator
            .handle_utterance(HandleUtteranceRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                prompt: "방금 제가 뭐라고 했죠?".to_string(),
                auto_store: false,
                generate_response: true,
            })
            .await;
        assert!(result.success);
        assert!(result.memory_plan.needs_retrieval);
        assert!(result
            .actions_taken
            .iter()
            .any(|a| matches!(a, ActionTaken::Retrieval { .. })));
    }

    #[tokio::test]
    async fn handle_utterance_auto_store_persists_the_prompt() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .handle_utterance(HandleUtteranceRequest {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                prompt: "제 이름은 김철수입니다.".to_string(),
                auto_store: true,
                generate_response: true,
            })
            .await;
        assert!(result.success);
        assert!(result
            .actions_taken
            .iter()
            .any(|a| matches!(a, ActionTaken::StoredPrompt { stored: true, .. })));
        assert_eq!(orchestrator.conversation_buffer("u1").len(), 1);
        assert_eq!(orchestrator.user_model("u1").interaction_count, 1);
    }

    #[tokio::test]
    async fn conversation_buffer_caps_at_configured_size() {
        let orchestrator = orchestrator();
        for i in 0..(defaults::CONVERSATION_BUFFER_SIZE + 5) {
            orchestrator
                .handle_utterance(HandleUtteranceRequest {
                    user_id: "u1".to_string(),
                    session_id: "s1".to_string(),
                    prompt: format!("메시지 번호 {i}"),
                    auto_store: false,
                    generate_response: false,
                })
                .await;
        }
        assert_eq!(orchestrator.conversation_buffer("u1").len(), defaults::CONVERSATION_BUFFER_SIZE);
    }

    #[test]
    fn content_type_for_maps_every_major_minor_without_panicking() {
        for path in [
            "personal/identity",
            "personal/preference",
            "personal/profession",
            "knowledge/skill",
            "knowledge/experience",
            "knowledge/fact",
            "temporal/conversation",
            "temporal/context",
        ] {
            let _ = content_type_for(path);
        }
    }
}

