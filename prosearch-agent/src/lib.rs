//! Prosearch Agent - iterative multi-source research workflow
//!
//! Given a conversation, the engine:
//! - Routes the question to a targeted lookup or to open web research
//! - Fans out one task per query in waves and merges their results
//! - Reflects on the gathered evidence and loops with follow-up queries
//! - Writes a final answer and rewrites its short citations to canonical sources
//!
//! Text generation, search and lookup are injected collaborators
//! (see [`prosearch_core::traits`]).

pub mod research;

pub use research::{
    CitationResolver, Collaborators, LoopController, LoopDecision, QueryRouter, ResearchEngine,
    ResearchOutcome, ResultCollector, Route, RouteKind, SufficiencyEvaluator, TaskDispatcher,
    TaskUnit, Wave, WorkflowState,
};
