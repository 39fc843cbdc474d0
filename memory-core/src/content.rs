//! Content processor (C2): normalization, entity extraction, keyword
//! extraction, and per-type dispatch (§4.2).

use crate::constants::defaults;
use crate::error::{Error, Result};
use crate::types::{Entity, MemoryClassification, MemoryPath, StorageFormat};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// The content-type discriminant carried by `process`'s caller (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Conversation,
    Fact,
    Preference,
    Identity,
    Skill,
    Experience,
}

/// The result of running an utterance through the content processor (§4.2).
#[derive(Debug, Clone)]
pub struct ProcessedContent {
    pub content: String,
    pub storage_format: StorageFormat,
    pub entities: Vec<Entity>,
    pub keywords: Vec<String>,
    pub summary: Option<String>,
    /// The `{subject, preference_type, preference_level, reason?}` /
    /// `{skills[], level?, category?}` / identity-entity record for
    /// `format=json` types (§4.2). `None` for `full`/`structured`/`summary`.
    pub structured_content: Option<serde_json::Value>,
    /// `None` means the pipeline should drop the utterance (§4.2 edge cases:
    /// trivial fact, sub-threshold experience, unresolved preference).
    pub importance_override: Option<f32>,
}

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"저는\s+([가-힣]{2,4})이고").unwrap(),
        Regex::new(r"저는\s+([가-힣]{2,4})입니다").unwrap(),
        Regex::new(r"제\s+이름은\s+([가-힣]{2,4})").unwrap(),
        Regex::new(r"(?i)my name is\s+([A-Z][a-z]+)").unwrap(),
        Regex::new(r"(?i)I(?:'m| am)\s+([A-Z][a-z]+)").unwrap(),
    ]
});

static AGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(\d{1,3})\s*살").unwrap(),
        Regex::new(r"(\d{1,3})\s*세(?:입니다|예요)?").unwrap(),
        Regex::new(r"(?i)(\d{1,3})\s*years?\s*old").unwrap(),
    ]
});

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap(),
        Regex::new(r"\d{1,2}월\s*\d{1,2}일").unwrap(),
        Regex::new(r"(?i)\d{1,2}/\d{1,2}/\d{2,4}").unwrap(),
    ]
});

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());

const PRONOUN_STOPLIST: &[&str] = &["그것", "이것", "저것"];

const TECH_KEYWORDS: &[&str] = &[
    "python", "파이썬", "java", "자바", "javascript", "자바스크립트", "rust", "러스트",
    "react", "리액트", "fastapi", "django", "장고", "docker", "도커", "kubernetes",
    "쿠버네티스", "postgresql", "mongodb", "redis", "go", "golang",
];

const HOBBY_KEYWORDS: &[&str] = &[
    "등산", "독서", "여행", "음악", "운동", "게임", "요리", "영화", "사진",
];

const JOB_KEYWORDS: &[&str] = &[
    "developer", "개발자", "engineer", "엔지니어", "manager", "매니저", "cto", "ceo",
    "lead", "리드",
];

const LOCATION_KEYWORDS: &[&str] = &[
    "서울", "부산", "인천", "대구", "제주", "seoul", "busan", "incheon", "tokyo",
    "new york", "london", "paris",
];

const COMPANY_KEYWORDS: &[&str] = &[
    "google", "구글", "삼성", "samsung", "네이버", "naver", "카카오", "kakao", "microsoft",
    "마이크로소프트", "amazon", "아마존",
];

const LIKE_KEYWORDS: &[&str] = &["좋아", "좋아해", "사랑", "love", "like", "enjoy"];
const DISLIKE_KEYWORDS: &[&str] = &["싫어", "싫어해", "hate", "dislike"];
const STRONG_INTENSITY_KEYWORDS: &[&str] = &["정말", "너무", "매우", "really", "very", "much"];
const SKILL_LEVEL_KEYWORDS: &[(&str, &[&str])] = &[
    ("beginner", &["초보", "입문", "beginner", "novice"]),
    ("expert", &["전문가", "숙련", "expert", "advanced"]),
    ("intermediate", &["중급", "intermediate"]),
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "and", "or", "but", "in", "on", "at",
    "to", "of", "for", "with", "이", "그", "저", "는", "은", "이다", "있다", "하다",
    "것", "수", "를", "을", "에", "의", "가",
];

/// Markers that flag a sentence as the one worth leading a summary with
/// (§4.2: "the first sentence containing a priority marker from a fixed
/// list"). Korean emphasis/conclusion particles alongside their English
/// equivalents.
const SUMMARY_PRIORITY_MARKERS: &[&str] = &[
    "중요", "핵심", "반드시", "꼭", "기억해", "important", "key", "must", "remember", "critical",
];

pub struct ContentProcessor;

impl Default for ContentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run the full pipeline for one utterance: normalize, extract entities
    /// and keywords, summarize if large, and dispatch to the per-type policy
    /// that decides whether the result is stored at all (§4.2).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `content` is empty after trimming.
    pub fn process(
        &self,
        content: &str,
        content_type: ContentType,
        classification: &MemoryClassification,
    ) -> Result<ProcessedContent> {
        let normalized = Self::normalize(content);
        if normalized.is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }

        let entities = Self::extract_entities(&normalized);
        let keywords = Self::extract_keywords(&normalized);

        let dispatch = self.dispatch(content_type, &normalized, &entities, &keywords, classification);

        // Large content is summarized regardless of per-type format, except
        // for the json-structured types: a parsed record has no "sentence"
        // to truncate, so size never demotes it to `summary` (§4.2, §4.3).
        let mut storage_format = dispatch.storage_format.unwrap_or(StorageFormat::Full);
        let summary = if normalized.len() > defaults::LARGE_CONTENT_BYTES {
            if storage_format != StorageFormat::Json {
                storage_format = StorageFormat::Summary;
            }
            Some(Self::summarize(&normalized))
        } else {
            None
        };

        Ok(ProcessedContent {
            content: normalized,
            storage_format,
            entities,
            keywords,
            summary,
            structured_content: dispatch.structured_content,
            importance_override: dispatch.importance,
        })
    }

    /// Collapse whitespace runs and trim; preserves Unicode content as-is.
    fn normalize(content: &str) -> String {
        content.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Per-type dispatch deciding drop/keep, storage format, and any
    /// structured payload or importance override (§4.2). `importance: None`
    /// signals the pipeline should drop the utterance entirely.
    fn dispatch(
        &self,
        content_type: ContentType,
        content: &str,
        entities: &[Entity],
        keywords: &[String],
        classification: &MemoryClassification,
    ) -> DispatchOutcome {
        match content_type {
            // Always stored (resolved Open Question OQ-1: question-form
            // utterances are stored, at the higher of the two importances).
            ContentType::Conversation => {
                let interrogative = content.contains('?') || classification.path.detail == "question";
                DispatchOutcome::keep(if interrogative { 7.0 } else { 5.0 }, StorageFormat::Full)
            }
            ContentType::Fact => {
                if entities.is_empty() && keywords.len() < defaults::MIN_FACT_KEYWORDS {
                    return DispatchOutcome::drop();
                }
                let importance = 6.0 + 0.5 * entities.len() as f32 + 0.2 * keywords.len() as f32;
                DispatchOutcome::keep(importance.min(defaults::FACT_IMPORTANCE_CAP), StorageFormat::Structured)
            }
            ContentType::Preference => Self::dispatch_preference(content, keywords),
            ContentType::Identity => Self::dispatch_identity(entities),
            ContentType::Skill => Self::dispatch_skill(content, entities, keywords),
            ContentType::Experience => {
                if content.split_whitespace().count() < defaults::MIN_EXPERIENCE_WORDS {
                    return DispatchOutcome::drop();
                }
                DispatchOutcome::keep(defaults::EXPERIENCE_IMPORTANCE_CAP, StorageFormat::Full)
            }
        }
    }

    /// `{subject, preference_type, preference_level, reason?}` (§4.2).
    /// Stored only if a `like`/`dislike` signal resolved a `preference_type`.
    fn dispatch_preference(content: &str, keywords: &[String]) -> DispatchOutcome {
        let lower = content.to_lowercase();
        let preference_type = if LIKE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            "like"
        } else if DISLIKE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            "dislike"
        } else {
            return DispatchOutcome::drop();
        };

        let preference_level = if STRONG_INTENSITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            9
        } else {
            5
        };
        let subject = keywords.first().cloned().unwrap_or_else(|| "general".to_string());
        let reason = if keywords.len() > 1 { Some(keywords[1..].join(" ")) } else { None };

        let mut record = serde_json::json!({
            "subject": subject,
            "preference_type": preference_type,
            "preference_level": preference_level,
        });
        if let Some(reason) = reason {
            record["reason"] = serde_json::json!(reason);
        }

        DispatchOutcome {
            importance: None,
            storage_format: Some(StorageFormat::Json),
            structured_content: Some(record),
        }
    }

    /// Collects identity entities (name/age/location/gender/family).
    /// Always stored if any identity entity is present; importance fixed
    /// at 9 (§4.2).
    fn dispatch_identity(entities: &[Entity]) -> DispatchOutcome {
        let identity_entities: Vec<&Entity> = entities
            .iter()
            .filter(|e| matches!(e.entity_type.as_str(), "name" | "age" | "location"))
            .collect();
        if identity_entities.is_empty() {
            return DispatchOutcome::drop();
        }
        let record = serde_json::json!({
            "entities": identity_entities
                .iter()
                .map(|e| serde_json::json!({"type": e.entity_type, "value": e.value, "confidence": e.confidence}))
                .collect::<Vec<_>>(),
        });
        DispatchOutcome {
            importance: Some(9.0),
            storage_format: Some(StorageFormat::Json),
            structured_content: Some(record),
        }
    }

    /// `{skills[], level?, category?}` (§4.2). Importance fixed at 7.5.
    fn dispatch_skill(content: &str, entities: &[Entity], keywords: &[String]) -> DispatchOutcome {
        let lower = content.to_lowercase();
        let skills: Vec<&str> = entities
            .iter()
            .filter(|e| e.entity_type == "technology")
            .map(|e| e.value.as_str())
            .collect();
        if skills.is_empty() && keywords.is_empty() {
            return DispatchOutcome::drop();
        }
        let level = SKILL_LEVEL_KEYWORDS
            .iter()
            .find(|(_, kws)| kws.iter().any(|k| lower.contains(k)))
            .map(|(level, _)| *level);
        let category = if skills.is_empty() { None } else { Some("technical") };

        let mut record = serde_json::json!({ "skills": skills });
        if let Some(level) = level {
            record["level"] = serde_json::json!(level);
        }
        if let Some(category) = category {
            record["category"] = serde_json::json!(category);
        }

        DispatchOutcome {
            importance: Some(7.5),
            storage_format: Some(StorageFormat::Json),
            structured_content: Some(record),
        }
    }

    /// Extract name/age/location/company/technology/hobby/job-title/number/
    /// date entities via fixed keyword and regex registries (§4.2).
    #[must_use]
    pub fn extract_entities(content: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        let lower = content.to_lowercase();

        for pattern in NAME_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(content) {
                if let Some(m) = caps.get(1) {
                    let name = m.as_str();
                    let len = name.chars().count();
                    if (2..=4).contains(&len) && !PRONOUN_STOPLIST.contains(&name) {
                        entities.push(Entity::new("name", name, 0.9));
                        break;
                    }
                }
            }
        }

        for pattern in AGE_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(content) {
                if let Some(m) = caps.get(1) {
                    entities.push(Entity::new("age", m.as_str(), 0.9));
                    break;
                }
            }
        }

        for pattern in DATE_PATTERNS.iter() {
            if let Some(m) = pattern.find(content) {
                entities.push(Entity::new("date", m.as_str(), 0.9));
                break;
            }
        }

        for location in LOCATION_KEYWORDS {
            if lower.contains(location) {
                entities.push(Entity::new("location", *location, 0.8));
            }
        }
        for company in COMPANY_KEYWORDS {
            if lower.contains(company) {
                entities.push(Entity::new("company", *company, 0.8));
            }
        }
        for tech in TECH_KEYWORDS {
            if lower.contains(tech) {
                entities.push(Entity::new("technology", *tech, 0.8));
            }
        }
        for hobby in HOBBY_KEYWORDS {
            if lower.contains(hobby) {
                entities.push(Entity::new("hobby", *hobby, 0.7));
            }
        }
        for job in JOB_KEYWORDS {
            if lower.contains(job) {
                entities.push(Entity::new("job_title", *job, 0.7));
            }
        }
        for keyword in LIKE_KEYWORDS.iter().chain(DISLIKE_KEYWORDS.iter()) {
            if lower.contains(keyword) {
                entities.push(Entity::new("preference", *keyword, 0.8));
                break;
            }
        }
        // Numbers already captured as a more specific entity (age) are
        // skipped to avoid double-counting the same span.
        let age_values: HashSet<&str> = entities
            .iter()
            .filter(|e| e.entity_type == "age")
            .map(|e| e.value.as_str())
            .collect();
        for m in NUMBER_PATTERN.find_iter(content) {
            if !age_values.contains(m.as_str()) {
                entities.push(Entity::new("number", m.as_str(), 0.6));
            }
        }

        entities
    }

    /// Extract up to [`defaults::MAX_KEYWORDS`] content words, stop-word
    /// filtered, in first-seen order (§4.2).
    #[must_use]
    pub fn extract_keywords(content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keywords = Vec::new();
        for word in content.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if cleaned.len() < 2 || STOP_WORDS.contains(&cleaned.as_str()) {
                continue;
            }
            if seen.insert(cleaned.clone()) {
                keywords.push(cleaned);
            }
            if keywords.len() >= defaults::MAX_KEYWORDS {
                break;
            }
        }
        keywords
    }

    /// Summary policy (§4.2): return `content` unchanged if it is already
    /// within `max_length`; otherwise pick the first sentence carrying a
    /// priority marker, falling back to the first sentence, and truncate
    /// that choice to `max_length`.
    #[must_use]
    pub fn summarize(content: &str) -> String {
        let max_length = defaults::SUMMARY_MAX_LENGTH;
        if content.chars().count() <= max_length {
            return content.to_string();
        }

        let sentences = Self::split_sentences(content);
        let chosen = sentences
            .iter()
            .find(|s| SUMMARY_PRIORITY_MARKERS.iter().any(|m| s.contains(m)))
            .or_else(|| sentences.first())
            .map_or(content, String::as_str);

        Self::truncate_chars(chosen, max_length)
    }

    /// Split on sentence-terminating punctuation (`.`, `!`, `?`), keeping
    /// the terminator with its sentence and dropping empty fragments.
    fn split_sentences(content: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        for c in content.chars() {
            current.push(c);
            if matches!(c, '.' | '!' | '?') {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
        let trailing = current.trim();
        if !trailing.is_empty() {
            sentences.push(trailing.to_string());
        }
        sentences
    }

    fn truncate_chars(s: &str, max_length: usize) -> String {
        if s.chars().count() <= max_length {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max_length).collect();
            format!("{truncated}…")
        }
    }

    /// Resolve the `major/minor/detail` a content type would fall under
    /// absent an explicit classification, for callers constructing a
    /// `Memory` directly (e.g. identity capture tools).
    #[must_use]
    pub fn default_path(content_type: ContentType) -> MemoryPath {
        use crate::types::Major::{Knowledge, Personal, Temporal};
        match content_type {
            ContentType::Conversation => MemoryPath::new(Temporal, "conversation", "statement"),
            ContentType::Fact => MemoryPath::fallback(),
            ContentType::Preference => MemoryPath::new(Personal, "preference", "general"),
            ContentType::Identity => MemoryPath::new(Personal, "identity", "name"),
            ContentType::Skill => MemoryPath::new(Knowledge, "skill", "technical"),
            ContentType::Experience => MemoryPath::new(Knowledge, "experience", "personal"),
        }
    }
}

/// Internal result of [`ContentProcessor::dispatch`] and its per-type
/// helpers, before being folded into [`ProcessedContent`].
struct DispatchOutcome {
    importance: Option<f32>,
    storage_format: Option<StorageFormat>,
    structured_content: Option<serde_json::Value>,
}

impl DispatchOutcome {
    fn keep(importance: f32, storage_format: StorageFormat) -> Self {
        Self {
            importance: Some(importance),
            storage_format: Some(storage_format),
            structured_content: None,
        }
    }

    fn drop() -> Self {
        Self {
            importance: None,
            storage_format: None,
            structured_content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Major;

    fn classification(detail: &str) -> MemoryClassification {
        MemoryClassification::new(MemoryPath::new(Major::Temporal, "conversation", detail), 0.5)
    }

    #[test]
    fn extracts_korean_name() {
        let entities = ContentProcessor::extract_entities("제 이름은 김철수입니다.");
        assert!(entities.iter().any(|e| e.entity_type == "name" && e.value == "김철수"));
    }

    #[test]
    fn rejects_pronoun_as_name() {
        let entities = ContentProcessor::extract_entities("저는 그것이고 했어요");
        assert!(!entities.iter().any(|e| e.entity_type == "name"));
    }

    #[test]
    fn extracts_technology_and_job_entities() {
        let entities = ContentProcessor::extract_entities("저는 Python 개발자입니다.");
        assert!(entities.iter().any(|e| e.entity_type == "technology" && e.value == "python"));
        assert!(entities.iter().any(|e| e.entity_type == "job_title" && e.value == "개발자"));
    }

    #[test]
    fn extracts_age_entity() {
        let entities = ContentProcessor::extract_entities("저는 32살입니다.");
        assert!(entities.iter().any(|e| e.entity_type == "age" && e.value == "32"));
        // The age span must not also surface as a generic "number" entity.
        assert!(!entities.iter().any(|e| e.entity_type == "number" && e.value == "32"));
    }

    #[test]
    fn extracts_location_entity() {
        let entities = ContentProcessor::extract_entities("저는 서울에 살고 있어요.");
        assert!(entities.iter().any(|e| e.entity_type == "location" && e.value == "서울"));
    }

    #[test]
    fn keyword_extraction_caps_at_ten_and_dedups() {
        let content = "alpha alpha beta gamma delta epsilon zeta eta theta iota kappa lambda";
        let keywords = ContentProcessor::extract_keywords(content);
        assert_eq!(keywords.len(), 10);
        assert_eq!(keywords[0], "alpha");
        assert_eq!(keywords.iter().filter(|k| *k == "alpha").count(), 1);
    }

    #[test]
    fn trivial_question_conversation_is_kept_with_importance_seven() {
        let p = ContentProcessor::new();
        let processed = p
            .process("뭐해?", ContentType::Conversation, &classification("question"))
            .unwrap();
        assert_eq!(processed.importance_override, Some(7.0));
    }

    #[test]
    fn trivial_non_question_conversation_is_kept_with_importance_five() {
        let p = ContentProcessor::new();
        let processed = p
            .process("네", ContentType::Conversation, &classification("response"))
            .unwrap();
        assert_eq!(processed.importance_override, Some(5.0));
    }

    #[test]
    fn short_experience_is_dropped() {
        let p = ContentProcessor::new();
        let classification = classification("question");
        let processed = p.process("짧은 경험", ContentType::Experience, &classification).unwrap();
        assert_eq!(processed.importance_override, None);
    }

    #[test]
    fn long_experience_is_kept_capped_at_nine() {
        let p = ContentProcessor::new();
        let classification = classification("question");
        let content = "단어 ".repeat(12);
        let processed = p.process(content.trim(), ContentType::Experience, &classification).unwrap();
        assert_eq!(processed.importance_override, Some(9.0));
    }

    #[test]
    fn large_content_is_summarized() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let content = "word ".repeat(400);
        let processed = p.process(content.trim(), ContentType::Fact, &classification).unwrap();
        assert_eq!(processed.storage_format, StorageFormat::Summary);
        assert!(processed.summary.is_some());
    }

    #[test]
    fn summarize_returns_short_content_unchanged() {
        let short = "짧은 문장입니다.";
        assert_eq!(ContentProcessor::summarize(short), short);
    }

    #[test]
    fn summarize_prefers_the_sentence_carrying_a_priority_marker() {
        let filler = "word ".repeat(60);
        let content = format!("{filler}. 이것은 정말 중요한 내용입니다. {filler}.");
        let summary = ContentProcessor::summarize(&content);
        assert!(summary.contains("중요한"));
    }

    #[test]
    fn summarize_falls_back_to_first_sentence_without_a_marker() {
        let first = "word ".repeat(60);
        let second = "other ".repeat(60);
        let content = format!("{first}. {second}.");
        let summary = ContentProcessor::summarize(&content);
        assert!(summary.starts_with("word"));
    }

    #[test]
    fn empty_content_is_rejected() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        assert!(p.process("   ", ContentType::Fact, &classification).is_err());
    }

    #[test]
    fn identity_with_name_entity_is_stored_at_importance_nine() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let processed = p
            .process("제 이름은 김철수입니다.", ContentType::Identity, &classification)
            .unwrap();
        assert_eq!(processed.importance_override, Some(9.0));
        assert_eq!(processed.storage_format, StorageFormat::Json);
        assert!(processed.structured_content.is_some());
    }

    #[test]
    fn identity_without_entities_is_dropped() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let processed = p.process("그냥 이야기해요", ContentType::Identity, &classification).unwrap();
        assert_eq!(processed.importance_override, None);
    }

    #[test]
    fn preference_with_like_keyword_resolves_and_is_stored() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let processed = p
            .process("저는 피자를 정말 좋아해요", ContentType::Preference, &classification)
            .unwrap();
        assert_eq!(processed.storage_format, StorageFormat::Json);
        let record = processed.structured_content.unwrap();
        assert_eq!(record["preference_type"], "like");
        assert_eq!(record["preference_level"], 9);
    }

    #[test]
    fn preference_without_like_or_dislike_is_dropped() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let processed = p.process("오늘 날씨 어때요", ContentType::Preference, &classification).unwrap();
        assert_eq!(processed.importance_override, None);
    }

    #[test]
    fn skill_with_technology_entity_is_stored_at_importance_seven_point_five() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let processed = p
            .process("저는 Rust를 전문가 수준으로 다룹니다", ContentType::Skill, &classification)
            .unwrap();
        assert_eq!(processed.importance_override, Some(7.5));
        let record = processed.structured_content.unwrap();
        assert_eq!(record["level"], "expert");
    }

    #[test]
    fn processing_is_deterministic() {
        let p = ContentProcessor::new();
        let classification = classification("statement");
        let a = p.process("저는 Python 개발자입니다.", ContentType::Fact, &classification).unwrap();
        let b = p.process("저는 Python 개발자입니다.", ContentType::Fact, &classification).unwrap();
        assert_eq!(a.keywords, b.keywords);
        assert_eq!(a.storage_format, b.storage_format);
        assert_eq!(a.importance_override, b.importance_override);
    }
}
