//! Types for the research workflow

use prosearch_core::{
    ErrorContext, Message, ProsearchError, ProsearchResult, SearchResult, SourceRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between result texts handed to the reflection collaborator
pub const REFLECTION_EVIDENCE_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between result texts handed to the answer collaborator
pub const ANSWER_EVIDENCE_SEPARATOR: &str = "\n---\n\n";

/// Why a topic was routed to the targeted lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupSignal {
    /// The topic contains a canonical reference; holds the normalized match
    Reference(String),
    /// The topic contains one of the configured domain keywords
    Keyword(String),
}

/// Task family chosen for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    TargetedLookup(LookupSignal),
    OpenResearch,
}

impl Route {
    pub fn is_targeted_lookup(&self) -> bool {
        matches!(self, Route::TargetedLookup(_))
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            Route::TargetedLookup(_) => RouteKind::TargetedLookup,
            Route::OpenResearch => RouteKind::OpenResearch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    TargetedLookup,
    OpenResearch,
}

/// What a dispatched task works on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    /// One open-ended web research query
    OpenResearch(String),
    /// The full query list; the lookup collaborator picks the entry it uses
    TargetedLookup(Vec<String>),
}

/// One dispatched task. Owned by the task until it completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUnit {
    pub ordinal: u64,
    pub payload: TaskPayload,
}

impl TaskUnit {
    /// Query recorded against this task's result
    pub fn label(&self) -> String {
        match &self.payload {
            TaskPayload::OpenResearch(query) => query.clone(),
            TaskPayload::TargetedLookup(queries) => queries.first().cloned().unwrap_or_default(),
        }
    }
}

/// A batch of tasks submitted together and joined together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    /// Zero-based position of this wave within the run
    pub index: usize,
    pub units: Vec<TaskUnit>,
}

impl Wave {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn ordinals(&self) -> Vec<u64> {
        self.units.iter().map(|u| u.ordinal).collect()
    }
}

/// State contribution of one finished task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUpdate {
    pub ordinal: u64,
    pub query_executed: Option<String>,
    pub search_results: Vec<SearchResult>,
    pub sources_gathered: Vec<SourceRecord>,
}

/// Shared state of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Conversation turns; the run appends exactly one answer turn
    pub messages: Vec<Message>,
    /// Queries produced by the router for the first wave
    pub query_list: Vec<String>,
    /// Results ordered by task ordinal
    pub search_results: Vec<SearchResult>,
    pub sources_gathered: Vec<SourceRecord>,
    /// Every query a task executed, keyed by task ordinal
    pub queries_run: BTreeMap<u64, String>,
    pub research_loop_count: u32,
    pub is_sufficient: bool,
    /// Advisory gap description from the latest reflection
    pub knowledge_gap: Option<String>,
    pub max_loops: u32,
    pub waves_dispatched: usize,
    route: Option<Route>,
    next_ordinal: u64,
}

impl WorkflowState {
    pub fn new(messages: Vec<Message>, max_loops: u32) -> Self {
        Self {
            messages,
            query_list: Vec::new(),
            search_results: Vec::new(),
            sources_gathered: Vec::new(),
            queries_run: BTreeMap::new(),
            research_loop_count: 0,
            is_sufficient: false,
            knowledge_gap: None,
            max_loops,
            waves_dispatched: 0,
            route: None,
            next_ordinal: 0,
        }
    }

    /// Record the routing decision. A run is routed exactly once.
    pub fn set_route(&mut self, route: Route, query_list: Vec<String>) -> ProsearchResult<()> {
        if self.route.is_some() {
            return Err(ProsearchError::Internal {
                message: "Routing decision already made for this run".to_string(),
                source: None,
                context: ErrorContext::new("workflow_state").with_operation("set_route"),
            });
        }
        self.route = Some(route);
        self.query_list = query_list;
        Ok(())
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn is_targeted_lookup(&self) -> bool {
        self.route
            .as_ref()
            .map(Route::is_targeted_lookup)
            .unwrap_or(false)
    }

    /// Hand out the next run-unique task ordinal
    pub fn allocate_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    /// Result texts in ordinal order joined with `separator`
    pub fn evidence(&self, separator: &str) -> String {
        self.search_results
            .iter()
            .map(|r| r.result_text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn loop_cap_reached(&self) -> bool {
        self.research_loop_count >= self.max_loops
    }
}

/// Result of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    /// Input conversation plus the appended answer turn
    pub messages: Vec<Message>,
    /// Sources actually cited by the answer
    pub sources: Vec<SourceRecord>,
    pub route: RouteKind,
    pub research_loop_count: u32,
    pub waves: usize,
    pub queries_run: Vec<String>,
    pub search_results: Vec<SearchResult>,
}

impl ResearchOutcome {
    /// Text of the final answer turn
    pub fn answer(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}
