//! Task dispatch: turns query lists into waves and runs them concurrently

use super::engine::Collaborators;
use super::types::{PartialUpdate, TaskPayload, TaskUnit, Wave, WorkflowState};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use prosearch_core::SearchResult;
use tracing::{info, info_span, warn, Instrument};

/// In-flight tasks of one wave, yielding each task's update as it finishes
pub type WaveCompletions = FuturesUnordered<BoxFuture<'static, PartialUpdate>>;

/// Builds waves of [`TaskUnit`]s and spawns them
pub struct TaskDispatcher;

impl TaskDispatcher {
    /// First wave of a routed run.
    ///
    /// A targeted lookup is a single task carrying the whole query list.
    /// Open research gets one task per query, in list order.
    pub fn initial_wave(state: &mut WorkflowState) -> Wave {
        let units = if state.is_targeted_lookup() {
            vec![TaskUnit {
                ordinal: state.allocate_ordinal(),
                payload: TaskPayload::TargetedLookup(state.query_list.clone()),
            }]
        } else {
            let queries = state.query_list.clone();
            Self::open_research_units(state, queries)
        };
        Self::seal(state, units)
    }

    /// Follow-up wave; ordinals continue from where the previous wave stopped
    pub fn follow_up_wave(state: &mut WorkflowState, queries: Vec<String>) -> Wave {
        let units = Self::open_research_units(state, queries);
        Self::seal(state, units)
    }

    /// Spawn every task of the wave. The wave is joined by draining the returned set.
    pub fn spawn(wave: &Wave, collaborators: &Collaborators, model: &str) -> WaveCompletions {
        info!(
            wave = wave.index,
            tasks = wave.len(),
            ordinals = ?wave.ordinals(),
            "Dispatching wave"
        );

        let completions = WaveCompletions::new();
        for unit in &wave.units {
            let ordinal = unit.ordinal;
            let label = unit.label();
            let span = info_span!("research_task", wave = wave.index, ordinal);
            let handle = tokio::spawn(
                execute(unit.clone(), collaborators.clone(), model.to_string()).instrument(span),
            );

            completions.push(
                async move {
                    match handle.await {
                        Ok(update) => update,
                        Err(join_error) => {
                            warn!(ordinal, error = %join_error, "Research task aborted");
                            failed(ordinal, label, format!("task aborted: {}", join_error))
                        }
                    }
                }
                .boxed(),
            );
        }
        completions
    }

    fn open_research_units(state: &mut WorkflowState, queries: Vec<String>) -> Vec<TaskUnit> {
        queries
            .into_iter()
            .map(|query| TaskUnit {
                ordinal: state.allocate_ordinal(),
                payload: TaskPayload::OpenResearch(query),
            })
            .collect()
    }

    fn seal(state: &mut WorkflowState, units: Vec<TaskUnit>) -> Wave {
        let wave = Wave {
            index: state.waves_dispatched,
            units,
        };
        state.waves_dispatched += 1;
        wave
    }
}

async fn execute(unit: TaskUnit, collaborators: Collaborators, model: String) -> PartialUpdate {
    let ordinal = unit.ordinal;
    match unit.payload {
        TaskPayload::OpenResearch(query) => {
            match collaborators
                .researcher
                .research(&query, ordinal, &model)
                .await
            {
                Ok(findings) => PartialUpdate {
                    ordinal,
                    query_executed: Some(query.clone()),
                    search_results: vec![SearchResult {
                        ordinal,
                        query,
                        result_text: findings.result_text,
                    }],
                    sources_gathered: findings.sources,
                },
                Err(e) => {
                    warn!(ordinal, query = %query, error = %e, "Open research task failed");
                    failed(ordinal, query, e)
                }
            }
        }
        TaskPayload::TargetedLookup(queries) => {
            let result_text = collaborators.lookup.lookup(&queries).await;
            let query = queries.first().cloned().unwrap_or_default();
            PartialUpdate {
                ordinal,
                query_executed: Some(query.clone()),
                search_results: vec![SearchResult {
                    ordinal,
                    query,
                    result_text,
                }],
                sources_gathered: Vec::new(),
            }
        }
    }
}

fn failed(ordinal: u64, query: String, reason: impl std::fmt::Display) -> PartialUpdate {
    PartialUpdate {
        ordinal,
        query_executed: Some(query.clone()),
        search_results: vec![SearchResult::error(ordinal, query, reason)],
        sources_gathered: Vec::new(),
    }
}
