//! Main research engine implementation

use super::{
    citations::CitationResolver,
    collector::ResultCollector,
    dispatcher::TaskDispatcher,
    evaluator::{LoopController, LoopDecision, SufficiencyEvaluator},
    router::{research_topic, QueryRouter},
    types::*,
};
use futures::StreamExt;
use prosearch_core::{
    timing::timed, AnswerWriter, Message, OpenResearcher, ProsearchConfig,
    ProsearchError, ProsearchResult, QueryGenerator, Reflector, ResearchSettings, RoutingConfig,
    RunOverrides, TargetedLookup,
};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// External collaborators injected into a run
#[derive(Clone)]
pub struct Collaborators {
    pub query_generator: Arc<dyn QueryGenerator>,
    pub researcher: Arc<dyn OpenResearcher>,
    pub lookup: Arc<dyn TargetedLookup>,
    pub reflector: Arc<dyn Reflector>,
    pub answer_writer: Arc<dyn AnswerWriter>,
}

/// Drives a research run from the conversation to a cited answer.
///
/// Each call to [`ResearchEngine::run`] owns its own [`WorkflowState`]; the
/// engine itself holds only configuration and collaborators and can serve
/// concurrent runs.
pub struct ResearchEngine {
    router: QueryRouter,
    settings: ResearchSettings,
    collaborators: Collaborators,
}

impl ResearchEngine {
    pub fn new(
        settings: ResearchSettings,
        routing: &RoutingConfig,
        collaborators: Collaborators,
    ) -> ProsearchResult<Self> {
        Ok(Self {
            router: QueryRouter::new(routing)?,
            settings,
            collaborators,
        })
    }

    pub fn from_config(
        config: &ProsearchConfig,
        collaborators: Collaborators,
    ) -> ProsearchResult<Self> {
        Self::new(config.research.clone(), &config.routing, collaborators)
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Run the workflow to completion.
    ///
    /// Errors are returned only for fatal conditions: no user turn, query
    /// generation failure or answer generation failure. Individual task
    /// failures end up as `"Error: ..."` results instead.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        overrides: &RunOverrides,
    ) -> ProsearchResult<ResearchOutcome> {
        let settings = self.settings.resolve(overrides);
        let mut state = WorkflowState::new(messages, settings.max_research_loops);

        let topic = research_topic(&state.messages)?;
        let span = info_span!("research_run", topic = %topic);

        async move {
            info!(
                initial_queries = settings.initial_query_count,
                max_loops = settings.max_research_loops,
                query_model = %settings.query_model,
                reasoning_model = %settings.reasoning_model,
                "Starting research run"
            );

            let routed = self
                .router
                .route(
                    &topic,
                    settings.initial_query_count,
                    self.collaborators.query_generator.as_ref(),
                    &settings.query_model,
                )
                .await?;
            state.set_route(routed.route, routed.query_list)?;

            let mut wave = TaskDispatcher::initial_wave(&mut state);
            loop {
                self.run_wave(&wave, &mut state, &settings.query_model).await;

                // Targeted lookups are single pass
                if state.is_targeted_lookup() {
                    break;
                }

                let evaluation = SufficiencyEvaluator::evaluate(
                    &mut state,
                    &topic,
                    self.collaborators.reflector.as_ref(),
                    &settings.reasoning_model,
                )
                .await;

                match LoopController::decide(&state, evaluation) {
                    LoopDecision::Finalize(reason) => {
                        info!(
                            ?reason,
                            loops = state.research_loop_count,
                            "Research loop finished"
                        );
                        break;
                    }
                    LoopDecision::Continue(follow_ups) => {
                        wave = TaskDispatcher::follow_up_wave(&mut state, follow_ups);
                    }
                }
            }

            self.finalize(&mut state, &topic, &settings.reasoning_model).await?;

            Ok::<_, ProsearchError>(Self::outcome(state))
        }
        .instrument(span)
        .await
    }

    /// Spawn a wave and fold each task's update into the state as it completes
    async fn run_wave(&self, wave: &Wave, state: &mut WorkflowState, model: &str) {
        let mut completions = TaskDispatcher::spawn(wave, &self.collaborators, model);

        timed("research_wave", async {
            while let Some(update) = completions.next().await {
                ResultCollector::merge(state, update);
            }
        })
        .await;

        info!(
            wave = wave.index,
            tasks = wave.len(),
            total_results = state.search_results.len(),
            total_sources = state.sources_gathered.len(),
            "Wave complete"
        );
    }

    /// Write the answer, resolve its citations and append it as the final turn
    async fn finalize(
        &self,
        state: &mut WorkflowState,
        topic: &str,
        model: &str,
    ) -> ProsearchResult<()> {
        let evidence = state.evidence(ANSWER_EVIDENCE_SEPARATOR);
        let raw = self
            .collaborators
            .answer_writer
            .answer(topic, &evidence, model)
            .await?;

        let resolved = CitationResolver::resolve(&raw, &state.sources_gathered);
        info!(
            gathered = state.sources_gathered.len(),
            cited = resolved.sources.len(),
            "Final answer ready"
        );

        state.messages.push(Message::assistant(resolved.text));
        state.sources_gathered = resolved.sources;
        Ok(())
    }

    fn outcome(state: WorkflowState) -> ResearchOutcome {
        let route = state
            .route()
            .map(Route::kind)
            .unwrap_or(RouteKind::OpenResearch);

        ResearchOutcome {
            route,
            research_loop_count: state.research_loop_count,
            waves: state.waves_dispatched,
            queries_run: state.queries_run.into_values().collect(),
            search_results: state.search_results,
            sources: state.sources_gathered,
            messages: state.messages,
        }
    }
}
