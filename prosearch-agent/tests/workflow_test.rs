//! Integration tests for the research workflow driven through `ResearchEngine`

use prosearch_agent::{Collaborators, ResearchEngine, RouteKind};
use prosearch_core::{
    async_trait, AnswerWriter, ErrorContext, GeneratedQuery, Message, OpenResearcher,
    ProsearchError, ProsearchResult, QueryGenerator, Reflection, Reflector, ResearchFindings,
    ResearchSettings, RoutingConfig, RunOverrides, SourceRecord, TargetedLookup,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Returns `count` numbered queries, or fails when configured to
struct MockGenerator {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl QueryGenerator for MockGenerator {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        _model: &str,
    ) -> ProsearchResult<Vec<GeneratedQuery>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProsearchError::QueryGeneration {
                message: "generator offline".to_string(),
                source: None,
                context: ErrorContext::new("mock_generator"),
            });
        }
        Ok((0..count)
            .map(|i| GeneratedQuery::Structured {
                query: format!("{} #{}", topic, i),
                rationale: Some("coverage".to_string()),
            })
            .collect())
    }
}

/// Cites one source per query; queries containing "boom" fail and
/// queries containing "panic" panic
#[derive(Default)]
struct MockResearcher {
    seen: Mutex<Vec<(String, u64, String)>>,
}

#[async_trait]
impl OpenResearcher for MockResearcher {
    async fn research(
        &self,
        query: &str,
        ordinal: u64,
        model: &str,
    ) -> ProsearchResult<ResearchFindings> {
        self.seen
            .lock()
            .unwrap()
            .push((query.to_string(), ordinal, model.to_string()));

        if query.contains("panic") {
            panic!("researcher blew up");
        }
        if query.contains("boom") {
            return Err(ProsearchError::Search {
                message: "search provider unreachable".to_string(),
                source: None,
                context: ErrorContext::new("mock_researcher"),
            });
        }

        let short_ref = format!("src://{}-0/", ordinal);
        Ok(ResearchFindings {
            result_text: format!("findings for {} [{}]", query, short_ref),
            sources: vec![SourceRecord::new(
                short_ref,
                format!("https://example.org/{}", ordinal),
            )],
        })
    }
}

#[derive(Default)]
struct MockLookup {
    calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl TargetedLookup for MockLookup {
    async fn lookup(&self, queries: &[String]) -> String {
        self.calls.lock().unwrap().push(queries.to_vec());
        match queries.first() {
            Some(query) => format!("article text for {}", query),
            None => "Error: No valid query found for targeted lookup.".to_string(),
        }
    }
}

/// Plays back scripted reflections; once exhausted it keeps reporting
/// insufficient evidence with one follow-up per pass
struct MockReflector {
    script: Mutex<VecDeque<ProsearchResult<Reflection>>>,
    calls: AtomicUsize,
}

impl MockReflector {
    fn new(script: Vec<ProsearchResult<Reflection>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn always_insufficient() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Reflector for MockReflector {
    async fn reflect(&self, _topic: &str, _evidence: &str, _model: &str) -> ProsearchResult<Reflection> {
        let pass = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(scripted) => scripted,
            None => Ok(insufficient(&[&format!("follow up {}", pass)])),
        }
    }
}

/// Echoes the evidence, optionally prefixed with fixed text
#[derive(Default)]
struct MockAnswerWriter {
    fixed: Option<String>,
    evidence: Mutex<Option<String>>,
}

#[async_trait]
impl AnswerWriter for MockAnswerWriter {
    async fn answer(&self, _topic: &str, evidence: &str, _model: &str) -> ProsearchResult<String> {
        *self.evidence.lock().unwrap() = Some(evidence.to_string());
        Ok(self.fixed.clone().unwrap_or_else(|| evidence.to_string()))
    }
}

fn insufficient(follow_ups: &[&str]) -> Reflection {
    Reflection {
        is_sufficient: false,
        knowledge_gap: "missing details".to_string(),
        follow_up_queries: follow_ups.iter().map(|q| q.to_string()).collect(),
    }
}

fn sufficient() -> Reflection {
    Reflection {
        is_sufficient: true,
        knowledge_gap: String::new(),
        follow_up_queries: Vec::new(),
    }
}

struct Harness {
    generator: Arc<MockGenerator>,
    researcher: Arc<MockResearcher>,
    lookup: Arc<MockLookup>,
    reflector: Arc<MockReflector>,
    answer_writer: Arc<MockAnswerWriter>,
    engine: ResearchEngine,
}

impl Harness {
    fn new(settings: ResearchSettings, reflector: MockReflector) -> Self {
        Self::build(settings, reflector, false, MockAnswerWriter::default())
    }

    fn build(
        settings: ResearchSettings,
        reflector: MockReflector,
        failing_generator: bool,
        answer_writer: MockAnswerWriter,
    ) -> Self {
        let generator = Arc::new(MockGenerator {
            fail: failing_generator,
            calls: AtomicUsize::new(0),
        });
        let researcher = Arc::new(MockResearcher::default());
        let lookup = Arc::new(MockLookup::default());
        let reflector = Arc::new(reflector);
        let answer_writer = Arc::new(answer_writer);

        let collaborators = Collaborators {
            query_generator: generator.clone(),
            researcher: researcher.clone(),
            lookup: lookup.clone(),
            reflector: reflector.clone(),
            answer_writer: answer_writer.clone(),
        };
        let engine = ResearchEngine::new(settings, &RoutingConfig::default(), collaborators)
            .expect("engine should build");

        Self {
            generator,
            researcher,
            lookup,
            reflector,
            answer_writer,
            engine,
        }
    }

    fn researched_ordinals(&self) -> Vec<u64> {
        self.researcher
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ordinal, _)| *ordinal)
            .collect()
    }
}

fn settings(initial_query_count: usize, max_research_loops: u32) -> ResearchSettings {
    ResearchSettings {
        initial_query_count,
        max_research_loops,
        ..ResearchSettings::default()
    }
}

#[tokio::test]
async fn test_open_research_dispatches_one_task_per_query() {
    let harness = Harness::new(settings(3, 2), MockReflector::new(vec![Ok(sufficient())]));

    let outcome = harness
        .engine
        .run(
            vec![Message::user("best hiking trails in Colorado")],
            &RunOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.route, RouteKind::OpenResearch);
    assert_eq!(outcome.waves, 1);
    assert_eq!(outcome.research_loop_count, 1);

    let mut ordinals = harness.researched_ordinals();
    ordinals.sort_unstable();
    assert_eq!(ordinals, vec![0, 1, 2]);

    let result_ordinals: Vec<u64> = outcome.search_results.iter().map(|r| r.ordinal).collect();
    assert_eq!(result_ordinals, vec![0, 1, 2]);
    assert_eq!(
        outcome.queries_run,
        vec![
            "best hiking trails in Colorado #0",
            "best hiking trails in Colorado #1",
            "best hiking trails in Colorado #2",
        ]
    );
}

#[tokio::test]
async fn test_reference_topic_is_single_targeted_pass() {
    let harness = Harness::new(settings(3, 2), MockReflector::always_insufficient());

    let outcome = harness
        .engine
        .run(
            vec![Message::user("道路交通管理處罰條例第7條")],
            &RunOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.route, RouteKind::TargetedLookup);
    assert_eq!(outcome.waves, 1);
    assert_eq!(outcome.research_loop_count, 0);
    assert_eq!(harness.reflector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
    assert!(harness.researcher.seen.lock().unwrap().is_empty());

    assert_eq!(
        *harness.lookup.calls.lock().unwrap(),
        vec![vec!["第7條".to_string()]]
    );
    assert_eq!(outcome.search_results.len(), 1);
    assert_eq!(outcome.search_results[0].ordinal, 0);
    assert_eq!(outcome.answer(), Some("article text for 第7條"));
}

#[tokio::test]
async fn test_keyword_topic_uses_first_generated_query() {
    let harness = Harness::new(settings(3, 2), MockReflector::always_insufficient());

    let outcome = harness
        .engine
        .run(
            vec![Message::user("闖紅燈的罰鍰是多少")],
            &RunOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.route, RouteKind::TargetedLookup);
    assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *harness.lookup.calls.lock().unwrap(),
        vec![vec!["闖紅燈的罰鍰是多少 #0".to_string()]]
    );
    assert_eq!(harness.reflector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_termination_within_cap_when_never_sufficient() {
    for max_loops in 0..=3u32 {
        let harness = Harness::new(settings(2, max_loops), MockReflector::always_insufficient());

        let outcome = harness
            .engine
            .run(
                vec![Message::user("history of the printing press")],
                &RunOverrides::default(),
            )
            .await
            .unwrap();

        let passes = harness.reflector.calls.load(Ordering::SeqCst) as u32;
        let expected = max_loops.max(1);
        assert_eq!(passes, expected, "max_loops = {}", max_loops);
        assert!(passes <= max_loops + 1);
        assert_eq!(outcome.research_loop_count, expected);
        assert_eq!(outcome.waves, expected as usize);
        assert!(outcome.answer().is_some());
    }
}

#[tokio::test]
async fn test_single_loop_cap_finalizes_after_first_reflection() {
    let harness = Harness::new(
        settings(2, 1),
        MockReflector::new(vec![Ok(insufficient(&["more detail"]))]),
    );

    let outcome = harness
        .engine
        .run(
            vec![Message::user("quantum error correction")],
            &RunOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.research_loop_count, 1);
    assert_eq!(outcome.waves, 1);
    assert_eq!(harness.reflector.calls.load(Ordering::SeqCst), 1);
    assert!(!outcome.queries_run.iter().any(|q| q == "more detail"));
}

#[tokio::test]
async fn test_ordinals_are_unique_across_waves() {
    let harness = Harness::new(
        settings(3, 3),
        MockReflector::new(vec![
            Ok(insufficient(&["gap a", "gap b"])),
            Ok(insufficient(&["gap c", "gap d", "gap e"])),
            Ok(sufficient()),
        ]),
    );

    let outcome = harness
        .engine
        .run(vec![Message::user("coral reef bleaching")], &RunOverrides::default())
        .await
        .unwrap();

    let ordinals = harness.researched_ordinals();
    let unique: HashSet<u64> = ordinals.iter().copied().collect();
    assert_eq!(ordinals.len(), 8);
    assert_eq!(unique.len(), 8);
    assert_eq!(unique, (0..8).collect());

    assert_eq!(outcome.waves, 3);
    assert_eq!(outcome.research_loop_count, 3);
    assert_eq!(outcome.queries_run.len(), 8);
    assert_eq!(&outcome.queries_run[3..5], &["gap a", "gap b"]);
}

#[tokio::test]
async fn test_empty_follow_ups_finalize() {
    let harness = Harness::new(
        settings(1, 5),
        MockReflector::new(vec![Ok(insufficient(&[]))]),
    );

    let outcome = harness
        .engine
        .run(vec![Message::user("tidal energy")], &RunOverrides::default())
        .await
        .unwrap();

    assert_eq!(outcome.waves, 1);
    assert_eq!(outcome.research_loop_count, 1);
}

#[tokio::test]
async fn test_failed_reflection_finalizes_with_evidence() {
    let harness = Harness::new(
        settings(2, 3),
        MockReflector::new(vec![Err(ProsearchError::Reflection {
            message: "malformed reflection".to_string(),
            source: None,
            context: ErrorContext::new("mock_reflector"),
        })]),
    );

    let outcome = harness
        .engine
        .run(vec![Message::user("lunar regolith")], &RunOverrides::default())
        .await
        .unwrap();

    assert_eq!(outcome.research_loop_count, 1);
    assert_eq!(outcome.waves, 1);
    assert!(outcome.answer().unwrap().contains("findings for lunar regolith #0"));
}

#[tokio::test]
async fn test_failing_task_becomes_error_placeholder() {
    let harness = Harness::new(
        settings(1, 2),
        MockReflector::new(vec![Ok(insufficient(&["boom query"])), Ok(sufficient())]),
    );

    let outcome = harness
        .engine
        .run(vec![Message::user("river deltas")], &RunOverrides::default())
        .await
        .unwrap();

    assert_eq!(outcome.search_results.len(), 2);
    let failed = &outcome.search_results[1];
    assert_eq!(failed.ordinal, 1);
    assert_eq!(failed.query, "boom query");
    assert!(failed.is_error());
    assert!(failed.result_text.contains("search provider unreachable"));
}

#[tokio::test]
async fn test_panicking_task_does_not_crash_the_wave() {
    let harness = Harness::new(
        settings(1, 2),
        MockReflector::new(vec![Ok(insufficient(&["panic query", "calm query"])), Ok(sufficient())]),
    );

    let outcome = harness
        .engine
        .run(vec![Message::user("volcanic soils")], &RunOverrides::default())
        .await
        .unwrap();

    assert_eq!(outcome.search_results.len(), 3);
    let panicked = outcome
        .search_results
        .iter()
        .find(|r| r.query == "panic query")
        .unwrap();
    assert!(panicked.is_error());
    assert!(outcome
        .search_results
        .iter()
        .any(|r| r.query == "calm query" && !r.is_error()));
}

#[tokio::test]
async fn test_generator_failure_is_fatal_before_dispatch() {
    let harness = Harness::build(
        settings(3, 2),
        MockReflector::always_insufficient(),
        true,
        MockAnswerWriter::default(),
    );

    let err = harness
        .engine
        .run(vec![Message::user("deep sea vents")], &RunOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProsearchError::QueryGeneration { .. }));
    assert!(err.is_fatal());
    assert!(harness.researcher.seen.lock().unwrap().is_empty());
    assert!(harness.answer_writer.evidence.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_missing_user_turn_is_rejected() {
    let harness = Harness::new(settings(3, 2), MockReflector::always_insufficient());

    let err = harness
        .engine
        .run(
            vec![Message::system("You are a research assistant")],
            &RunOverrides::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProsearchError::Validation { .. }));
    assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_answer_cites_only_referenced_sources() {
    let harness = Harness::build(
        settings(2, 1),
        MockReflector::new(vec![Ok(sufficient())]),
        false,
        MockAnswerWriter {
            fixed: Some("Glaciers retreat quickly [src://1-0/].".to_string()),
            ..MockAnswerWriter::default()
        },
    );

    let outcome = harness
        .engine
        .run(
            vec![
                Message::user("glaciers"),
                Message::assistant("What about them?"),
                Message::user("glacier retreat rates"),
            ],
            &RunOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.messages.len(), 4);
    assert_eq!(
        outcome.answer(),
        Some("Glaciers retreat quickly [https://example.org/1].")
    );
    assert_eq!(
        outcome.sources,
        vec![SourceRecord::new("src://1-0/", "https://example.org/1")]
    );

    let evidence = harness.answer_writer.evidence.lock().unwrap().clone().unwrap();
    assert!(evidence.contains("glacier retreat rates #0"));
    assert!(evidence.contains("\n---\n\n"));
}

#[tokio::test]
async fn test_run_overrides_take_precedence() {
    let harness = Harness::new(
        settings(3, 5),
        MockReflector::always_insufficient(),
    );

    let overrides = RunOverrides {
        initial_query_count: Some(1),
        max_research_loops: Some(1),
        query_model: Some("fast-model".to_string()),
        reasoning_model: None,
    };
    let outcome = harness
        .engine
        .run(vec![Message::user("solar sails")], &overrides)
        .await
        .unwrap();

    assert_eq!(outcome.research_loop_count, 1);
    let seen = harness.researcher.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].2, "fast-model");
    assert_eq!(harness.engine.settings().initial_query_count, 3);
}
