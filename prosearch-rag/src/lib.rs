//! Prosearch RAG - collaborators backing the research workflow
//!
//! This crate provides the concrete text generation, web research and
//! targeted lookup components that the workflow engine consumes through the
//! traits in [`prosearch_core::traits`]:
//! - siumai-backed LLM clients, one per model, built on demand
//! - DuckDuckGo web search with short-reference citations
//! - Query generation, reflection and answer writing over tera prompts
//! - An article index over a numbered-article corpus

pub mod collaborators;
pub mod llm_client;
pub mod lookup;
pub mod prompts;
pub mod structured;
pub mod types;
pub mod web_search;

pub use collaborators::*;
pub use llm_client::{LlmClientPool, ProsearchLlmClient};
pub use lookup::{Article, ArticleIndex, EMPTY_QUERY, NO_ARTICLES, NO_VALID_QUERY};
pub use prompts::PromptLibrary;
pub use structured::{parse_query_list, parse_reflection, QueryList};
pub use types::{RagError, RagResult, Stage, TextGenerator};
pub use web_search::{assign_short_refs, DuckDuckGoSearch, SearchHit, SearchProvider};

// Re-export commonly used types from siumai
pub use siumai::prelude::LlmClient;
