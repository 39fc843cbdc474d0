//! Classifier (C1): keyword-weighted hierarchical type classification (§4.1).
//!
//! The trigger-keyword tree below is ported verbatim from the reference
//! implementation's `HierarchicalMemoryType` table (see SPEC_FULL.md §4.1)
//! — it is a behavioral contract, not an implementation detail, because the
//! scenario tests in §8 depend on these exact Korean/English trigger words.

use crate::types::{Major, MemoryClassification, MemoryPath};
use std::collections::HashMap;

/// Context hints that bias classification toward the conversation's recent
/// trajectory (§4.1 "context boosts").
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    /// The classification path of the immediately preceding utterance in
    /// the same session, if any.
    pub previous_type: Option<String>,
    /// The set of paths that have recurred in this session, used for the
    /// smaller `1.2x` boost.
    pub session_types: Vec<String>,
}

/// A single leaf of the type tree: one `major/minor/detail` path and its
/// trigger keywords.
struct TypeLeaf {
    major: Major,
    minor: &'static str,
    detail: &'static str,
    keywords: &'static [&'static str],
}

/// Maps a `major/minor/detail` path to a base importance and (for a handful
/// of paths) a list of related paths consumed by the retrieval engine for
/// query expansion.
pub struct Classifier {
    tree: Vec<TypeLeaf>,
    importance_by_major_minor: HashMap<&'static str, f32>,
    importance_by_major: HashMap<&'static str, f32>,
    related: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        use Major::{Knowledge, Personal, Temporal};
        let tree = vec![
            // personal/identity
            TypeLeaf { major: Personal, minor: "identity", detail: "name", keywords: &["이름", "성함", "호칭", "name", "called"] },
            TypeLeaf { major: Personal, minor: "identity", detail: "age", keywords: &["나이", "살", "세", "출생", "age", "born"] },
            TypeLeaf { major: Personal, minor: "identity", detail: "location", keywords: &["살고", "거주", "위치", "주소", "사는", "live", "location"] },
            TypeLeaf { major: Personal, minor: "identity", detail: "gender", keywords: &["성별", "남자", "여자", "gender"] },
            TypeLeaf { major: Personal, minor: "identity", detail: "family", keywords: &["가족", "부모", "형제", "자녀", "family"] },
            // personal/preference
            TypeLeaf { major: Personal, minor: "preference", detail: "food", keywords: &["먹는", "음식", "좋아하는", "싫어하는", "food", "eat", "taste"] },
            TypeLeaf { major: Personal, minor: "preference", detail: "music", keywords: &["음악", "노래", "듣는", "music", "song"] },
            TypeLeaf { major: Personal, minor: "preference", detail: "activity", keywords: &["운동", "취미", "활동", "즐기는", "hobby", "activity"] },
            TypeLeaf { major: Personal, minor: "preference", detail: "style", keywords: &["스타일", "패션", "옷", "style", "fashion"] },
            TypeLeaf { major: Personal, minor: "preference", detail: "general", keywords: &["좋아", "싫어", "선호", "like", "dislike", "prefer"] },
            // personal/profession
            TypeLeaf { major: Personal, minor: "profession", detail: "job", keywords: &["직업", "일", "업무", "job", "work", "occupation"] },
            TypeLeaf { major: Personal, minor: "profession", detail: "company", keywords: &["회사", "직장", "근무", "company", "office"] },
            TypeLeaf { major: Personal, minor: "profession", detail: "role", keywords: &["역할", "직책", "담당", "role", "position", "title"] },
            TypeLeaf { major: Personal, minor: "profession", detail: "career", keywords: &["경력", "경험", "career", "experience"] },
            TypeLeaf { major: Personal, minor: "profession", detail: "education", keywords: &["학교", "전공", "졸업", "education", "study"] },
            // knowledge/fact
            TypeLeaf { major: Knowledge, minor: "fact", detail: "general", keywords: &["사실", "정보", "알고", "fact", "information"] },
            TypeLeaf { major: Knowledge, minor: "fact", detail: "specific", keywords: &["구체적", "정확한", "specific", "exact"] },
            TypeLeaf { major: Knowledge, minor: "fact", detail: "historical", keywords: &["과거", "역사", "예전", "history", "past"] },
            TypeLeaf { major: Knowledge, minor: "fact", detail: "current", keywords: &["현재", "지금", "최근", "current", "now"] },
            // knowledge/skill
            TypeLeaf { major: Knowledge, minor: "skill", detail: "technical", keywords: &["기술", "프로그래밍", "개발", "코딩", "tech", "programming"] },
            TypeLeaf { major: Knowledge, minor: "skill", detail: "language", keywords: &["언어", "영어", "한국어", "language", "speak"] },
            TypeLeaf { major: Knowledge, minor: "skill", detail: "soft", keywords: &["소통", "리더십", "협업", "communication", "leadership"] },
            TypeLeaf { major: Knowledge, minor: "skill", detail: "tool", keywords: &["도구", "사용", "프로그램", "tool", "software"] },
            // knowledge/experience
            TypeLeaf { major: Knowledge, minor: "experience", detail: "work", keywords: &["프로젝트", "업무", "일했", "project", "worked"] },
            TypeLeaf { major: Knowledge, minor: "experience", detail: "personal", keywords: &["경험", "했던", "기억", "experience", "memory"] },
            TypeLeaf { major: Knowledge, minor: "experience", detail: "achievement", keywords: &["성과", "달성", "이뤘", "achievement", "accomplished"] },
            TypeLeaf { major: Knowledge, minor: "experience", detail: "learning", keywords: &["배운", "학습", "공부", "learned", "studied"] },
            // temporal/conversation
            TypeLeaf { major: Temporal, minor: "conversation", detail: "question", keywords: &["?", "뭐", "어떻게", "왜", "언제", "what", "how", "why"] },
            TypeLeaf { major: Temporal, minor: "conversation", detail: "statement", keywords: &["입니다", "해요", "했어요", "is", "are", "was"] },
            TypeLeaf { major: Temporal, minor: "conversation", detail: "greeting", keywords: &["안녕", "반가", "hello", "hi"] },
            TypeLeaf { major: Temporal, minor: "conversation", detail: "response", keywords: &["네", "아니", "응답", "yes", "no", "response"] },
            // temporal/context
            TypeLeaf { major: Temporal, minor: "context", detail: "current", keywords: &["지금", "오늘", "현재", "now", "today", "current"] },
            TypeLeaf { major: Temporal, minor: "context", detail: "past", keywords: &["어제", "예전", "과거", "yesterday", "before", "past"] },
            TypeLeaf { major: Temporal, minor: "context", detail: "future", keywords: &["내일", "나중", "계획", "tomorrow", "later", "plan"] },
            TypeLeaf { major: Temporal, minor: "context", detail: "session", keywords: &["방금", "아까", "just", "recently"] },
        ];

        let mut importance_by_major_minor = HashMap::new();
        importance_by_major_minor.insert("personal/identity", 9.0);
        importance_by_major_minor.insert("personal/profession", 8.5);
        importance_by_major_minor.insert("knowledge/skill", 8.0);
        importance_by_major_minor.insert("personal/preference", 7.0);
        importance_by_major_minor.insert("knowledge/experience", 7.0);
        importance_by_major_minor.insert("knowledge/fact", 6.0);
        importance_by_major_minor.insert("temporal/context", 4.0);
        importance_by_major_minor.insert("temporal/conversation", 3.0);

        let mut importance_by_major = HashMap::new();
        importance_by_major.insert("personal", 7.0);
        importance_by_major.insert("knowledge", 6.0);
        importance_by_major.insert("temporal", 4.0);

        let mut related: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        related.insert("personal/identity/name", &["personal/identity/age", "personal/identity/location"]);
        related.insert("personal/profession/job", &["knowledge/skill/technical", "knowledge/experience/work"]);
        related.insert("knowledge/skill/technical", &["knowledge/experience/work", "personal/profession/job"]);
        related.insert("temporal/conversation/question", &["temporal/conversation/response", "temporal/context/current"]);

        Self {
            tree,
            importance_by_major_minor,
            importance_by_major,
            related,
        }
    }

    /// Classify an utterance, optionally biased by session context (§4.1).
    #[must_use]
    pub fn classify(&self, content: &str, context: &ClassificationContext) -> MemoryClassification {
        let lower = content.to_lowercase();
        let mut scores: HashMap<String, f32> = HashMap::new();

        for leaf in &self.tree {
            for keyword in leaf.keywords {
                if lower.contains(keyword) {
                    let mut weight = keyword.chars().count() as f32 / 10.0;
                    if lower.starts_with(keyword) {
                        weight *= 2.0;
                    }
                    let path = format!("{}/{}/{}", leaf.major, leaf.minor, leaf.detail);
                    *scores.entry(path).or_insert(0.0) += weight;
                }
            }
        }

        self.apply_context_boosts(&mut scores, context);

        if let Some((path, score)) = scores
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            let confidence = (score / 3.0).min(1.0);
            let memory_path = MemoryPath::parse(&path).unwrap_or_else(|_| MemoryPath::fallback());
            return MemoryClassification::new(memory_path, confidence);
        }

        self.fallback(content)
    }

    fn apply_context_boosts(&self, scores: &mut HashMap<String, f32>, context: &ClassificationContext) {
        if let Some(prev) = &context.previous_type {
            if let Some(score) = scores.get_mut(prev) {
                *score *= 1.5;
            }
        }
        for session_type in &context.session_types {
            if let Some(score) = scores.get_mut(session_type) {
                *score *= 1.2;
            }
        }
    }

    /// Fallback policy applied when no keyword matched (§4.1).
    fn fallback(&self, content: &str) -> MemoryClassification {
        if content.contains('?') {
            return MemoryClassification::new(
                MemoryPath::new(Major::Temporal, "conversation", "question"),
                0.8,
            );
        }
        if content.split_whitespace().count() < 10 {
            return MemoryClassification::new(
                MemoryPath::new(Major::Temporal, "conversation", "statement"),
                0.5,
            );
        }
        MemoryClassification::new(MemoryPath::fallback(), 0.3)
    }

    /// Derive importance from a classification: `base + 2*confidence`,
    /// clamped to `[0, 10]` (§4.1).
    #[must_use]
    pub fn importance(&self, classification: &MemoryClassification) -> f32 {
        let major_minor = classification.path.major_minor();
        let base = self
            .importance_by_major_minor
            .get(major_minor.as_str())
            .copied()
            .unwrap_or_else(|| {
                let major = classification.path.major.to_string();
                self.importance_by_major.get(major.as_str()).copied().unwrap_or(5.0)
            });
        (base + 2.0 * classification.confidence).clamp(0.0, 10.0)
    }

    /// Related paths consumed by the retrieval engine for query expansion
    /// (§4.1). Always includes the classification's own `major/minor`.
    #[must_use]
    pub fn related_types(&self, classification: &MemoryClassification) -> Vec<String> {
        let path = classification.path.to_path();
        let mut related: Vec<String> = self
            .related
            .get(path.as_str())
            .map(|v| v.iter().map(|s| (*s).to_string()).collect())
            .unwrap_or_default();
        related.push(classification.path.major_minor());
        related.sort();
        related.dedup();
        related
    }
}
