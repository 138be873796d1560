//! Sufficiency evaluation and the research loop decision

use super::types::{WorkflowState, REFLECTION_EVIDENCE_SEPARATOR};
use prosearch_core::Reflector;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Verdict of one evaluator pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_sufficient: bool,
    pub follow_up_queries: Vec<String>,
    pub research_loop_count: u32,
}

/// Runs the reflection collaborator over the accumulated evidence
pub struct SufficiencyEvaluator;

impl SufficiencyEvaluator {
    /// One reflection pass. Increments `research_loop_count` before anything else.
    ///
    /// A failing reflection is treated as sufficient so the run can still
    /// answer with what it has.
    pub async fn evaluate(
        state: &mut WorkflowState,
        topic: &str,
        reflector: &dyn Reflector,
        model: &str,
    ) -> Evaluation {
        state.research_loop_count += 1;
        let evidence = state.evidence(REFLECTION_EVIDENCE_SEPARATOR);

        let (is_sufficient, knowledge_gap, follow_up_queries) =
            match reflector.reflect(topic, &evidence, model).await {
                Ok(reflection) => (
                    reflection.is_sufficient,
                    Some(reflection.knowledge_gap).filter(|gap| !gap.trim().is_empty()),
                    reflection.follow_up_queries,
                ),
                Err(e) => {
                    warn!(
                        loop_count = state.research_loop_count,
                        error = %e,
                        "Reflection failed, finalizing with gathered evidence"
                    );
                    (true, None, Vec::new())
                }
            };

        state.is_sufficient = is_sufficient;
        state.knowledge_gap = knowledge_gap;

        info!(
            loop_count = state.research_loop_count,
            max_loops = state.max_loops,
            is_sufficient,
            follow_ups = follow_up_queries.len(),
            "Reflection complete"
        );

        Evaluation {
            is_sufficient,
            follow_up_queries,
            research_loop_count: state.research_loop_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    Sufficient,
    LoopCapReached,
    NoFollowUps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDecision {
    Finalize(FinalizeReason),
    /// Dispatch another wave with these queries
    Continue(Vec<String>),
}

/// Decides between another research wave and finalization
pub struct LoopController;

impl LoopController {
    /// The cap is compared against the already incremented loop count, so a
    /// run performs at most `max_loops` reflection passes (at least one).
    pub fn decide(state: &WorkflowState, evaluation: Evaluation) -> LoopDecision {
        if evaluation.is_sufficient {
            return LoopDecision::Finalize(FinalizeReason::Sufficient);
        }
        if state.loop_cap_reached() {
            return LoopDecision::Finalize(FinalizeReason::LoopCapReached);
        }
        if evaluation.follow_up_queries.is_empty() {
            return LoopDecision::Finalize(FinalizeReason::NoFollowUps);
        }
        LoopDecision::Continue(evaluation.follow_up_queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosearch_core::{async_trait, ErrorContext, ProsearchError, ProsearchResult, Reflection};

    struct FailingReflector;

    #[async_trait]
    impl Reflector for FailingReflector {
        async fn reflect(&self, _: &str, _: &str, _: &str) -> ProsearchResult<Reflection> {
            Err(ProsearchError::Reflection {
                message: "model unavailable".to_string(),
                source: None,
                context: ErrorContext::new("test"),
            })
        }
    }

    fn evaluation(is_sufficient: bool, follow_ups: &[&str], count: u32) -> Evaluation {
        Evaluation {
            is_sufficient,
            follow_up_queries: follow_ups.iter().map(|q| q.to_string()).collect(),
            research_loop_count: count,
        }
    }

    #[test]
    fn test_sufficient_finalizes() {
        let mut state = WorkflowState::new(vec![], 3);
        state.research_loop_count = 1;
        assert_eq!(
            LoopController::decide(&state, evaluation(true, &["more"], 1)),
            LoopDecision::Finalize(FinalizeReason::Sufficient)
        );
    }

    #[test]
    fn test_cap_uses_incremented_count() {
        let mut state = WorkflowState::new(vec![], 1);
        state.research_loop_count = 1;
        assert_eq!(
            LoopController::decide(&state, evaluation(false, &["more"], 1)),
            LoopDecision::Finalize(FinalizeReason::LoopCapReached)
        );
    }

    #[test]
    fn test_zero_cap_finalizes_after_first_pass() {
        let mut state = WorkflowState::new(vec![], 0);
        state.research_loop_count = 1;
        assert_eq!(
            LoopController::decide(&state, evaluation(false, &["more"], 1)),
            LoopDecision::Finalize(FinalizeReason::LoopCapReached)
        );
    }

    #[test]
    fn test_insufficient_below_cap_continues() {
        let mut state = WorkflowState::new(vec![], 2);
        state.research_loop_count = 1;
        assert_eq!(
            LoopController::decide(&state, evaluation(false, &["a", "b"], 1)),
            LoopDecision::Continue(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_no_follow_ups_finalizes() {
        let mut state = WorkflowState::new(vec![], 2);
        state.research_loop_count = 1;
        assert_eq!(
            LoopController::decide(&state, evaluation(false, &[], 1)),
            LoopDecision::Finalize(FinalizeReason::NoFollowUps)
        );
    }

    #[tokio::test]
    async fn test_failed_reflection_counts_and_finalizes() {
        let mut state = WorkflowState::new(vec![], 5);
        let evaluation =
            SufficiencyEvaluator::evaluate(&mut state, "topic", &FailingReflector, "model").await;

        assert_eq!(state.research_loop_count, 1);
        assert!(evaluation.is_sufficient);
        assert_eq!(
            LoopController::decide(&state, evaluation),
            LoopDecision::Finalize(FinalizeReason::Sufficient)
        );
    }
}
