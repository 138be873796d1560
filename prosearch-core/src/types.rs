//! Core data type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// A query as returned by a query generator: either a bare string or a
/// structured object carrying the query and the reasoning behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedQuery {
    Text(String),
    Structured {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
}

impl GeneratedQuery {
    /// The plain query string
    pub fn into_text(self) -> String {
        match self {
            GeneratedQuery::Text(query) => query,
            GeneratedQuery::Structured { query, .. } => query,
        }
    }
}

impl From<&str> for GeneratedQuery {
    fn from(query: &str) -> Self {
        GeneratedQuery::Text(query.to_string())
    }
}

/// A query paired with the text a task produced for it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ordinal of the task that produced this result
    pub ordinal: u64,
    pub query: String,
    pub result_text: String,
}

impl SearchResult {
    /// Placeholder recorded when a task fails
    pub fn error(ordinal: u64, query: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            ordinal,
            query: query.into(),
            result_text: format!("Error: {}", reason),
        }
    }

    pub fn is_error(&self) -> bool {
        self.result_text.starts_with("Error: ")
    }
}

/// A citable source: the compact marker used in generated text and the value it stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRecord {
    pub short_ref: String,
    pub canonical_value: String,
    /// Human readable label (page title), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SourceRecord {
    pub fn new(short_ref: impl Into<String>, canonical_value: impl Into<String>) -> Self {
        Self {
            short_ref: short_ref.into(),
            canonical_value: canonical_value.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Output of the open-research collaborator for a single query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFindings {
    pub result_text: String,
    pub sources: Vec<SourceRecord>,
}

/// Verdict of the reflection collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub is_sufficient: bool,
    #[serde(default)]
    pub knowledge_gap: String,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProsearchConfig {
    #[serde(default)]
    pub research: ResearchSettings,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Process-wide research defaults, overridable per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// Number of queries requested from the query generator
    pub initial_query_count: usize,
    /// Upper bound on reflection passes
    pub max_research_loops: u32,
    /// Model used for query generation and web research
    pub query_model: String,
    /// Model used for reflection and the final answer
    pub reasoning_model: String,
}

/// Per-run overrides of [`ResearchSettings`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOverrides {
    pub initial_query_count: Option<usize>,
    pub max_research_loops: Option<u32>,
    pub query_model: Option<String>,
    pub reasoning_model: Option<String>,
}

/// Settings in effect for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    pub initial_query_count: usize,
    pub max_research_loops: u32,
    pub query_model: String,
    pub reasoning_model: String,
}

/// Targeted-lookup detection rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Regex matching a canonical reference (e.g. a numbered clause)
    pub reference_pattern: String,
    /// Topics containing any of these are routed to the targeted lookup
    pub lookup_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// openai, anthropic, ollama or groq
    pub provider: String,
    /// Falls back to the provider's environment variable
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Attempts per call beyond the first
    pub max_retries: usize,
    /// System instruction prepended to the final answer prompt
    pub answer_system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits fetched per query
    pub max_results: usize,
    /// DuckDuckGo region code
    pub region: String,
    pub timeout_ms: u64,
    /// Concurrent search requests
    pub max_concurrent: usize,
    /// Minimum spacing between search requests
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Plain-text corpus of numbered articles
    pub corpus_path: Option<String>,
    /// Maximum articles returned for a keyword lookup
    pub max_matches: usize,
}
