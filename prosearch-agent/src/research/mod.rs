//! Research workflow engine
//!
//! Control flow: router -> dispatcher -> collector -> evaluator ->
//! (loop back to dispatcher | citation resolver) -> answer.

pub mod citations;
pub mod collector;
pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod router;
pub mod types;

pub use citations::{CitationResolver, ResolvedAnswer};
pub use collector::ResultCollector;
pub use dispatcher::{TaskDispatcher, WaveCompletions};
pub use engine::{Collaborators, ResearchEngine};
pub use evaluator::{
    Evaluation, FinalizeReason, LoopController, LoopDecision, SufficiencyEvaluator,
};
pub use router::{normalize_reference, research_topic, QueryRouter, RouterOutput};
pub use types::*;
