//! Targeted lookup over a corpus of numbered articles
//!
//! The corpus is plain text in which every article starts on a line with a
//! `第N條` heading. A query naming an article returns that article; any other
//! query returns the articles sharing the most character bigrams with it.

use crate::types::{RagError, RagResult};
use async_trait::async_trait;
use prosearch_core::TargetedLookup;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

pub const NO_VALID_QUERY: &str = "Error: No valid query found for targeted lookup.";
pub const EMPTY_QUERY: &str = "Error: Empty query for targeted lookup.";
pub const NO_ARTICLES: &str = "Error: No articles loaded for targeted lookup.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub number: u32,
    /// Normalized heading, e.g. `第7條`
    pub reference: String,
    /// Full article text including the heading line
    pub text: String,
}

#[derive(Debug)]
pub struct ArticleIndex {
    articles: Vec<Article>,
    max_matches: usize,
    reference_re: Regex,
}

impl ArticleIndex {
    /// Split `corpus` into articles. Text before the first heading is ignored.
    pub fn parse(corpus: &str, max_matches: usize) -> RagResult<Self> {
        let heading_re = Regex::new(r"^\s*第\s*(\d+)\s*條")
            .map_err(|e| RagError::Config(format!("Invalid article pattern: {}", e)))?;
        let reference_re = Regex::new(r"第\s*(\d+)\s*條")
            .map_err(|e| RagError::Config(format!("Invalid article pattern: {}", e)))?;

        let mut articles: Vec<Article> = Vec::new();
        for line in corpus.lines() {
            let heading = heading_re
                .captures(line)
                .and_then(|cap| cap.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());

            if let Some(number) = heading {
                articles.push(Article {
                    number,
                    reference: format!("第{}條", number),
                    text: line.trim().to_string(),
                });
                continue;
            }

            let line = line.trim();
            if let Some(current) = articles.last_mut().filter(|_| !line.is_empty()) {
                current.text.push('\n');
                current.text.push_str(line);
            }
        }

        info!(articles = articles.len(), "Built article index");
        Ok(Self {
            articles,
            max_matches: max_matches.max(1),
            reference_re,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, max_matches: usize) -> RagResult<Self> {
        let corpus = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&corpus, max_matches)
    }

    /// An index with no articles; every lookup reports that nothing is loaded
    pub fn empty(max_matches: usize) -> RagResult<Self> {
        Self::parse("", max_matches)
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// The article a query names, if it names one that exists
    pub fn by_reference(&self, query: &str) -> Option<&Article> {
        let number = self
            .reference_re
            .captures(query)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())?;
        self.articles.iter().find(|a| a.number == number)
    }

    /// Articles ranked by shared character bigrams, best first
    pub fn search(&self, query: &str) -> Vec<&Article> {
        let query_grams = bigrams(query);
        if query_grams.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Article)> = self
            .articles
            .iter()
            .map(|article| {
                let article_grams = bigrams(&article.text);
                (query_grams.intersection(&article_grams).count(), article)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps corpus order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.max_matches)
            .map(|(_, article)| article)
            .collect()
    }

    fn answer(&self, query: &str) -> String {
        if let Some(article) = self.by_reference(query) {
            debug!(reference = %article.reference, "Lookup matched article reference");
            return article.text.clone();
        }

        let matches = self.search(query);
        debug!(query = %query, matches = matches.len(), "Lookup keyword search");
        if matches.is_empty() {
            return format!("No matching articles found for \"{}\".", query);
        }
        matches
            .iter()
            .map(|a| a.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl TargetedLookup for ArticleIndex {
    async fn lookup(&self, queries: &[String]) -> String {
        let Some(query) = queries.first() else {
            return NO_VALID_QUERY.to_string();
        };
        let query = query.trim();
        if query.is_empty() {
            return EMPTY_QUERY.to_string();
        }
        if self.articles.is_empty() {
            return NO_ARTICLES.to_string();
        }
        self.answer(query)
    }
}

/// Character bigrams of `text`, ignoring whitespace and punctuation
fn bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}
