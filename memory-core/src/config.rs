//! Layered configuration (§4.8.3): environment-variable driven, with
//! typed, range-validated fields. Mirrors the shape of the teacher's
//! `memory-cli/src/config.rs` env loader and the reference
//! implementation's `config.py` defaults.
//!
//! Loading never panics: a missing variable falls back to the documented
//! default, and a malformed value returns [`crate::error::Error::Validation`].

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// Agent dispatch mode recognized by `MEMORY_AGENT_AGENT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentType {
    Basic,
    React,
    Hybrid,
}

impl AgentType {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(Self::Basic),
            "react" => Ok(Self::React),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Validation(format!(
                "MEMORY_AGENT_AGENT_TYPE must be one of basic, react, hybrid, got {other:?}"
            ))),
        }
    }
}

/// The environment variables recognized by the core (§6), loaded into
/// typed, validated fields.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub agent_type: AgentType,
    pub enable_intelligence: bool,
    pub max_reasoning_steps: u32,
    pub importance_threshold: f32,
    pub context_window_size: usize,
    pub default_embedding_model: String,
    pub default_llm_model: String,
    pub default_collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_search_limit: usize,
    pub default_similarity_threshold: f32,
    pub external_call_timeout: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            agent_type: AgentType::Hybrid,
            enable_intelligence: true,
            max_reasoning_steps: 5,
            importance_threshold: 4.0,
            context_window_size: 10,
            default_embedding_model: "text-embedding-3-small".to_string(),
            default_llm_model: "gpt-4o-mini".to_string(),
            default_collection: "memories".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            default_search_limit: 10,
            default_similarity_threshold: 0.7,
            external_call_timeout: crate::constants::defaults::EXTERNAL_CALL_TIMEOUT,
        }
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Validation(format!("{key} has invalid value {raw:?}"))),
    }
}

impl MemoryConfig {
    /// Load configuration from the process environment, applying the
    /// defaults of §6 for anything unset and validating ranges (§4.8.3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a recognized variable is set but
    /// malformed, or if a parsed value is out of its documented range.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let agent_type = match env::var("MEMORY_AGENT_AGENT_TYPE") {
            Err(_) => defaults.agent_type,
            Ok(raw) => AgentType::parse(&raw)?,
        };

        let enable_intelligence = match env::var("MEMORY_AGENT_ENABLE_INTELLIGENCE") {
            Err(_) => defaults.enable_intelligence,
            Ok(raw) => parse_bool(&raw)?,
        };

        let max_reasoning_steps: u32 = env_parse("MEMORY_AGENT_MAX_REASONING_STEPS", defaults.max_reasoning_steps)?;
        if !(1..=20).contains(&max_reasoning_steps) {
            return Err(Error::Validation(format!(
                "MEMORY_AGENT_MAX_REASONING_STEPS must be in [1, 20], got {max_reasoning_steps}"
            )));
        }

        let importance_threshold: f32 =
            env_parse("MEMORY_AGENT_IMPORTANCE_THRESHOLD", defaults.importance_threshold)?;
        if !(0.0..=10.0).contains(&importance_threshold) {
            return Err(Error::Validation(format!(
                "MEMORY_AGENT_IMPORTANCE_THRESHOLD must be in [0, 10], got {importance_threshold}"
            )));
        }

        let context_window_size: usize =
            env_parse("MEMORY_AGENT_CONTEXT_WINDOW_SIZE", defaults.context_window_size)?;

        let chunk_size: usize = env_parse("CHUNK_SIZE", defaults.chunk_size)?;
        let chunk_overlap: usize = env_parse("CHUNK_OVERLAP", defaults.chunk_overlap)?;
        let default_search_limit: usize = env_parse("DEFAULT_SEARCH_LIMIT", defaults.default_search_limit)?;
        let default_similarity_threshold: f32 =
            env_parse("DEFAULT_SIMILARITY_THRESHOLD", defaults.default_similarity_threshold)?;
        if !(0.0..=1.0).contains(&default_similarity_threshold) {
            return Err(Error::Validation(format!(
                "DEFAULT_SIMILARITY_THRESHOLD must be in [0, 1], got {default_similarity_threshold}"
            )));
        }

        Ok(Self {
            agent_type,
            enable_intelligence,
            max_reasoning_steps,
            importance_threshold,
            context_window_size,
            default_embedding_model: env_or("DEFAULT_EMBEDDING_MODEL", &defaults.default_embedding_model),
            default_llm_model: env_or("DEFAULT_LLM_MODEL", &defaults.default_llm_model),
            default_collection: env_or("DEFAULT_COLLECTION", &defaults.default_collection),
            chunk_size,
            chunk_overlap,
            default_search_limit,
            default_similarity_threshold,
            external_call_timeout: defaults.external_call_timeout,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Validation(format!("expected a boolean, got {other:?}"))),
    }
}
