//! Structured output parsing for model responses
//!
//! Models are asked for a JSON object but often wrap it in prose or code
//! fences. The outermost JSON value is sliced out before deserializing.

use crate::types::{RagError, RagResult};
use prosearch_core::{GeneratedQuery, Reflection};
use serde::Deserialize;
use tracing::debug;

/// Queries produced by the query writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryList {
    pub queries: Vec<GeneratedQuery>,
    pub rationale: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<GeneratedQuery>),
    One(GeneratedQuery),
}

#[derive(Deserialize)]
struct RawQueryList {
    #[serde(alias = "queries")]
    query: OneOrMany,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Object(RawQueryList),
    Bare(Vec<GeneratedQuery>),
}

/// Parse the query writer's response.
///
/// Accepts `{"query": [...], "rationale": ...}` (also a single query or a
/// `queries` key) or a bare JSON array. Entries may be strings or objects with
/// a `query` field. Blank entries are dropped.
pub fn parse_query_list(response: &str) -> RagResult<QueryList> {
    let json = extract_json(response)
        .ok_or_else(|| RagError::Parse("no JSON found in query writer response".to_string()))?;

    let parsed: QueryResponse = serde_json::from_str(json)
        .map_err(|e| RagError::Parse(format!("invalid query list: {}", e)))?;

    let (queries, rationale) = match parsed {
        QueryResponse::Object(RawQueryList { query, rationale }) => match query {
            OneOrMany::Many(queries) => (queries, rationale),
            OneOrMany::One(query) => (vec![query], rationale),
        },
        QueryResponse::Bare(queries) => (queries, None),
    };

    let queries: Vec<GeneratedQuery> = queries
        .into_iter()
        .filter(|q| !query_text(q).trim().is_empty())
        .collect();

    debug!(queries = queries.len(), "Parsed query list");
    Ok(QueryList { queries, rationale })
}

/// Parse the reflection response into a [`Reflection`]
pub fn parse_reflection(response: &str) -> RagResult<Reflection> {
    let json = extract_json(response)
        .ok_or_else(|| RagError::Parse("no JSON found in reflection response".to_string()))?;

    let mut reflection: Reflection = serde_json::from_str(json)
        .map_err(|e| RagError::Parse(format!("invalid reflection: {}", e)))?;

    reflection.follow_up_queries.retain(|q| !q.trim().is_empty());
    Ok(reflection)
}

/// Slice the outermost JSON object or array out of `text`
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = match text.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn query_text(query: &GeneratedQuery) -> &str {
    match query {
        GeneratedQuery::Text(text) => text,
        GeneratedQuery::Structured { query, .. } => query,
    }
}
