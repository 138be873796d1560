//! Prompt templates for the research collaborators
//!
//! Every prompt carries the current date so the model can judge how recent
//! its evidence needs to be.

use crate::types::RagResult;
use tera::{Context, Tera};

const QUERY_WRITER: &str = "query_writer";
const WEB_SEARCHER: &str = "web_searcher";
const REFLECTION: &str = "reflection";
const ANSWER: &str = "answer";

const QUERY_WRITER_TEMPLATE: &str = r#"Your goal is to write sophisticated and diverse web search queries for an automated research tool that reads results and summarizes them.

Instructions:
- Prefer a single query; add more only when the question has several distinct aspects.
- Write at most {{ count }} queries.
- Queries must be diverse. Do not write several near-identical queries.
- Queries should target the most current information. The current date is {{ current_date }}.

Respond with a JSON object and nothing else:
{
  "rationale": "why these queries cover the topic",
  "query": ["first query", "second query"]
}

Topic: {{ topic }}"#;

const WEB_SEARCHER_TEMPLATE: &str = r#"Summarize the search results below into a factual, verifiable text about "{{ query }}".

Instructions:
- The current date is {{ current_date }}.
- Use only facts found in the results.
- Cite every fact with the reference of the result it came from, written exactly as given, as a markdown link: [title](reference).
- Do not invent references.

Search results:
{% for hit in hits %}
[{{ hit.reference }}] {{ hit.title }}
{{ hit.snippet }}
{% endfor %}"#;

const REFLECTION_TEMPLATE: &str = r#"You are an expert research assistant analyzing summaries about "{{ topic }}".

Instructions:
- Decide whether the summaries are sufficient to answer the topic. The current date is {{ current_date }}.
- If they are not, describe the knowledge gap and write follow-up queries that close it.
- Follow-up queries must be self-contained and include the necessary context for a web search.

Respond with a JSON object and nothing else:
{
  "is_sufficient": false,
  "knowledge_gap": "what is missing",
  "follow_up_queries": ["a specific follow-up query"]
}

Summaries:
{{ summaries }}"#;

const ANSWER_TEMPLATE: &str = r#"Write a high-quality answer to the user's question based on the provided summaries.

Instructions:
- The current date is {{ current_date }}.
- Use only the information in the summaries.
- Keep every citation from the summaries exactly as written; they are required in the answer.

User question:
{{ topic }}

Summaries:
{{ summaries }}"#;

/// A search hit as listed in the web searcher prompt
#[derive(Debug, Clone, serde::Serialize)]
pub struct PromptHit<'a> {
    pub reference: &'a str,
    pub title: &'a str,
    pub snippet: &'a str,
}

/// Renders the research prompts
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> RagResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (QUERY_WRITER, QUERY_WRITER_TEMPLATE),
            (WEB_SEARCHER, WEB_SEARCHER_TEMPLATE),
            (REFLECTION, REFLECTION_TEMPLATE),
            (ANSWER, ANSWER_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn query_writer(&self, topic: &str, count: usize) -> RagResult<String> {
        let mut context = dated_context();
        context.insert("topic", topic);
        context.insert("count", &count);
        Ok(self.tera.render(QUERY_WRITER, &context)?)
    }

    pub fn web_searcher(&self, query: &str, hits: &[PromptHit<'_>]) -> RagResult<String> {
        let mut context = dated_context();
        context.insert("query", query);
        context.insert("hits", hits);
        Ok(self.tera.render(WEB_SEARCHER, &context)?)
    }

    pub fn reflection(&self, topic: &str, summaries: &str) -> RagResult<String> {
        let mut context = dated_context();
        context.insert("topic", topic);
        context.insert("summaries", summaries);
        Ok(self.tera.render(REFLECTION, &context)?)
    }

    pub fn answer(&self, topic: &str, summaries: &str) -> RagResult<String> {
        let mut context = dated_context();
        context.insert("topic", topic);
        context.insert("summaries", summaries);
        Ok(self.tera.render(ANSWER, &context)?)
    }
}

/// Date in the form "October 16, 2026"
pub fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

fn dated_context() -> Context {
    let mut context = Context::new();
    context.insert("current_date", &current_date());
    context
}
