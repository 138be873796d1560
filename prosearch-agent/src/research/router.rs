//! Query routing: targeted lookup vs. open research

use super::types::{LookupSignal, Route};
use prosearch_core::{
    validation_error, ErrorContext, Message, ProsearchError, ProsearchResult, QueryGenerator, Role,
    RoutingConfig,
};
use regex::Regex;
use tracing::{debug, info};

/// Routing decision and the queries for the first wave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOutput {
    pub route: Route,
    pub query_list: Vec<String>,
}

/// Classifies research topics and produces the initial query list
#[derive(Debug, Clone)]
pub struct QueryRouter {
    reference_pattern: Regex,
    /// Lowercased keywords
    lookup_keywords: Vec<String>,
}

impl QueryRouter {
    pub fn new(config: &RoutingConfig) -> ProsearchResult<Self> {
        let reference_pattern =
            Regex::new(&config.reference_pattern).map_err(|e| ProsearchError::Config {
                message: format!("Invalid reference pattern: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("router")
                    .with_operation("compile_pattern")
                    .with_suggestion("Check routing.reference_pattern"),
            })?;

        Ok(Self {
            reference_pattern,
            lookup_keywords: config
                .lookup_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    /// Decide the task family for a topic without calling any collaborator
    pub fn classify(&self, topic: &str) -> Route {
        if let Some(found) = self.reference_pattern.find(topic) {
            return Route::TargetedLookup(LookupSignal::Reference(normalize_reference(
                found.as_str(),
            )));
        }

        let lowered = topic.to_lowercase();
        if let Some(keyword) = self
            .lookup_keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
        {
            return Route::TargetedLookup(LookupSignal::Keyword(keyword.clone()));
        }

        Route::OpenResearch
    }

    /// Classify the topic and build the initial query list.
    ///
    /// Query generation failures are propagated: without queries the run cannot proceed.
    pub async fn route(
        &self,
        topic: &str,
        query_count: usize,
        generator: &dyn QueryGenerator,
        model: &str,
    ) -> ProsearchResult<RouterOutput> {
        let route = self.classify(topic);

        let query_list = match &route {
            Route::TargetedLookup(LookupSignal::Reference(reference)) => vec![reference.clone()],
            Route::TargetedLookup(LookupSignal::Keyword(_)) => {
                let candidates = generator.generate(topic, query_count, model).await?;
                let first = candidates
                    .into_iter()
                    .next()
                    .map(|q| q.into_text())
                    .unwrap_or_else(|| topic.to_string());
                vec![first]
            }
            Route::OpenResearch => {
                let queries: Vec<String> = generator
                    .generate(topic, query_count, model)
                    .await?
                    .into_iter()
                    .map(|q| q.into_text())
                    .collect();
                if queries.is_empty() {
                    // An empty first wave would reflect on no evidence at all
                    vec![topic.to_string()]
                } else {
                    queries
                }
            }
        };

        info!(
            targeted_lookup = route.is_targeted_lookup(),
            queries = query_list.len(),
            "Routed research topic"
        );
        debug!(?route, ?query_list, "Router output");

        Ok(RouterOutput { route, query_list })
    }
}

/// Strip all whitespace from a matched reference. Idempotent.
pub fn normalize_reference(reference: &str) -> String {
    reference.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The research topic is the content of the latest user turn
pub fn research_topic(messages: &[Message]) -> ProsearchResult<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|m| m.content.trim().to_string())
        .ok_or_else(|| validation_error!("Conversation has no user turn", "messages", "router"))
}
