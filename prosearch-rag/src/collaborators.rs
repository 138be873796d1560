//! LLM and web backed implementations of the workflow collaborators

use crate::prompts::{PromptHit, PromptLibrary};
use crate::structured::{parse_query_list, parse_reflection};
use crate::types::{RagError, Stage, TextGenerator};
use crate::web_search::{assign_short_refs, SearchProvider};
use async_trait::async_trait;
use prosearch_core::{
    AnswerWriter, GeneratedQuery, OpenResearcher, ProsearchResult, QueryGenerator, Reflection,
    Reflector, ResearchFindings,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Writes search queries with the query model
pub struct LlmQueryGenerator {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl LlmQueryGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        model: &str,
    ) -> ProsearchResult<Vec<GeneratedQuery>> {
        let result = async {
            let prompt = self.prompts.query_writer(topic, count)?;
            let response = self.llm.complete(model, None, &prompt).await?;
            let mut parsed = parse_query_list(&response)?;
            parsed.queries.truncate(count.max(1));
            if parsed.queries.is_empty() {
                debug!(topic = %topic, "Query writer returned an empty list");
            }
            if let Some(rationale) = &parsed.rationale {
                debug!(rationale = %rationale, "Query writer rationale");
            }
            Ok::<_, RagError>(parsed.queries)
        }
        .await;

        result.map_err(|e| e.at_stage(Stage::QueryGeneration))
    }
}

/// Searches the web for one query and summarizes the hits with citations.
///
/// Hits are cited through short references (`src://{ordinal}-{i}/`) that the
/// final answer step rewrites back to URLs.
pub struct WebResearcher {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl WebResearcher {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        llm: Arc<dyn TextGenerator>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        Self {
            search,
            llm,
            prompts,
        }
    }
}

#[async_trait]
impl OpenResearcher for WebResearcher {
    async fn research(
        &self,
        query: &str,
        ordinal: u64,
        model: &str,
    ) -> ProsearchResult<ResearchFindings> {
        let result = async {
            let hits = self.search.search(query).await?;
            if hits.is_empty() {
                return Err(RagError::Search(format!("no results for \"{}\"", query)));
            }

            let sources = assign_short_refs(ordinal, &hits);
            let listed: Vec<PromptHit<'_>> = sources
                .iter()
                .zip(&hits)
                .map(|(source, hit)| PromptHit {
                    reference: &source.short_ref,
                    title: &hit.title,
                    snippet: &hit.snippet,
                })
                .collect();

            let prompt = self.prompts.web_searcher(query, &listed)?;
            let summary = self.llm.complete(model, None, &prompt).await?;

            let cited: Vec<_> = sources
                .into_iter()
                .filter(|s| summary.contains(&s.short_ref))
                .collect();

            info!(
                ordinal,
                hits = hits.len(),
                cited = cited.len(),
                "Web research complete"
            );

            Ok::<_, RagError>(ResearchFindings {
                result_text: summary,
                sources: cited,
            })
        }
        .await;

        result.map_err(|e| e.at_stage(Stage::Search))
    }
}

/// Judges evidence sufficiency with the reasoning model
pub struct LlmReflector {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl LlmReflector {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(
        &self,
        topic: &str,
        evidence: &str,
        model: &str,
    ) -> ProsearchResult<Reflection> {
        let result = async {
            let prompt = self.prompts.reflection(topic, evidence)?;
            let response = self.llm.complete(model, None, &prompt).await?;
            parse_reflection(&response)
        }
        .await;

        result.map_err(|e| e.at_stage(Stage::Reflection))
    }
}

/// Writes the final answer with the reasoning model
pub struct LlmAnswerWriter {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
    system_prompt: Option<String>,
}

impl LlmAnswerWriter {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            llm,
            prompts,
            system_prompt: None,
        }
    }

    /// System instruction sent ahead of the answer prompt, e.g. a language directive
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|s| !s.trim().is_empty());
        self
    }
}

#[async_trait]
impl AnswerWriter for LlmAnswerWriter {
    async fn answer(&self, topic: &str, evidence: &str, model: &str) -> ProsearchResult<String> {
        let result = async {
            let prompt = self.prompts.answer(topic, evidence)?;
            self.llm
                .complete(model, self.system_prompt.as_deref(), &prompt)
                .await
        }
        .await;

        result.map_err(|e| e.at_stage(Stage::Answer))
    }
}
