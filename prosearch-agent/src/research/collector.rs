//! Folds task results into the shared workflow state

use super::types::{PartialUpdate, WorkflowState};
use tracing::debug;

/// Merges per-task partial updates with append/union semantics.
///
/// Merges never overwrite accumulated entries. Results are kept in ordinal
/// order and sources are deduplicated, so the final state does not depend on
/// the order in which tasks finish.
pub struct ResultCollector;

impl ResultCollector {
    /// Apply one task's update. Called once per task with exclusive access to the state.
    pub fn merge(state: &mut WorkflowState, update: PartialUpdate) {
        let PartialUpdate {
            ordinal,
            query_executed,
            search_results,
            sources_gathered,
        } = update;

        if let Some(query) = query_executed {
            state.queries_run.insert(ordinal, query);
        }

        let result_count = search_results.len();
        for result in search_results {
            let position = state
                .search_results
                .partition_point(|existing| existing.ordinal <= result.ordinal);
            state.search_results.insert(position, result);
        }

        let mut new_sources = 0;
        for source in sources_gathered {
            if !state.sources_gathered.contains(&source) {
                state.sources_gathered.push(source);
                new_sources += 1;
            }
        }

        debug!(
            ordinal,
            results = result_count,
            new_sources,
            total_results = state.search_results.len(),
            "Merged task result"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosearch_core::{SearchResult, SourceRecord};
    use std::collections::HashSet;

    fn update(ordinal: u64, text: &str, refs: &[(&str, &str)]) -> PartialUpdate {
        PartialUpdate {
            ordinal,
            query_executed: Some(format!("query {}", ordinal)),
            search_results: vec![SearchResult {
                ordinal,
                query: format!("query {}", ordinal),
                result_text: text.to_string(),
            }],
            sources_gathered: refs
                .iter()
                .map(|(short, canonical)| SourceRecord::new(*short, *canonical))
                .collect(),
        }
    }

    fn updates() -> Vec<PartialUpdate> {
        vec![
            update(0, "alpha", &[("src://0-0/", "https://a.example")]),
            update(1, "beta", &[("src://1-0/", "https://b.example")]),
            update(
                2,
                "gamma",
                &[
                    ("src://2-0/", "https://c.example"),
                    ("src://0-0/", "https://a.example"),
                ],
            ),
        ]
    }

    #[test]
    fn test_merge_appends_without_overwriting() {
        let mut state = WorkflowState::new(vec![], 2);
        for u in updates() {
            ResultCollector::merge(&mut state, u);
        }

        assert_eq!(state.search_results.len(), 3);
        assert_eq!(state.sources_gathered.len(), 3);
        assert_eq!(state.queries_run.len(), 3);
        assert_eq!(state.evidence(" | "), "alpha | beta | gamma");
    }

    #[test]
    fn test_merge_is_order_independent() {
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let mut baseline: Option<(Vec<SearchResult>, HashSet<SourceRecord>)> = None;
        for order in orders {
            let all = updates();
            let mut state = WorkflowState::new(vec![], 2);
            for index in order {
                ResultCollector::merge(&mut state, all[index].clone());
            }

            let sources: HashSet<_> = state.sources_gathered.iter().cloned().collect();
            match &baseline {
                None => baseline = Some((state.search_results.clone(), sources)),
                Some((results, expected_sources)) => {
                    assert_eq!(&state.search_results, results, "order {:?}", order);
                    assert_eq!(&sources, expected_sources, "order {:?}", order);
                }
            }
        }
    }

    #[test]
    fn test_results_follow_ordinal_order() {
        let mut state = WorkflowState::new(vec![], 2);
        ResultCollector::merge(&mut state, update(5, "late", &[]));
        ResultCollector::merge(&mut state, update(3, "early", &[]));
        ResultCollector::merge(&mut state, update(4, "middle", &[]));

        let ordinals: Vec<u64> = state.search_results.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![3, 4, 5]);
    }
}
