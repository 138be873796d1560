//! Collaborator contracts consumed by the research workflow
//!
//! The workflow owns sequencing, fan-out and citation handling. Text
//! generation, web search and domain lookup sit behind these traits and are
//! injected at run start.

use crate::error::ProsearchResult;
use crate::types::*;
use async_trait::async_trait;

/// Produces candidate search queries for a topic
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generate up to `count` queries using `model`. Failure is fatal for the run.
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        model: &str,
    ) -> ProsearchResult<Vec<GeneratedQuery>>;
}

/// Researches one open-ended query
#[async_trait]
pub trait OpenResearcher: Send + Sync {
    /// `ordinal` is the run-unique id of the dispatched task; implementations
    /// use it to keep short references unique across tasks.
    async fn research(
        &self,
        query: &str,
        ordinal: u64,
        model: &str,
    ) -> ProsearchResult<ResearchFindings>;
}

/// Answers a query from the targeted knowledge domain
#[async_trait]
pub trait TargetedLookup: Send + Sync {
    /// Uses at least the first entry of `queries`. Invalid input is reported as
    /// an `"Error: ..."` string, never as a failure.
    async fn lookup(&self, queries: &[String]) -> String;
}

/// Judges whether gathered evidence answers the topic
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(&self, topic: &str, evidence: &str, model: &str)
        -> ProsearchResult<Reflection>;
}

/// Writes the final answer from gathered evidence
#[async_trait]
pub trait AnswerWriter: Send + Sync {
    async fn answer(&self, topic: &str, evidence: &str, model: &str) -> ProsearchResult<String>;
}
