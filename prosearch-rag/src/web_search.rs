//! Web search over the DuckDuckGo HTML endpoint (no API key required)

use crate::types::{RagError, RagResult};
use async_trait::async_trait;
use prosearch_core::{with_timeout, RateLimiter, SearchConfig, SourceRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Hard cap on hits per query
const MAX_RESULTS_CAP: usize = 10;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A single search result entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Source of web search hits
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> RagResult<Vec<SearchHit>>;
}

/// DuckDuckGo HTML search.
///
/// Queries are sent as a POST form; GET requests with non-ASCII queries tend
/// to be answered with a CAPTCHA page.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    config: SearchConfig,
    limiter: RateLimiter,
    parser: HitParser,
}

impl DuckDuckGoSearch {
    pub fn new(config: SearchConfig) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(config.max_concurrent, config.min_interval_ms),
            parser: HitParser::new()?,
            config,
        })
    }

    async fn fetch(&self, query: &str) -> RagResult<String> {
        let form = format!(
            "q={}&kl={}",
            urlencoding::encode(query),
            urlencoding::encode(&self.config.region),
        );

        let response = self
            .client
            .post(SEARCH_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Referer", "https://html.duckduckgo.com/")
            .body(form)
            .send()
            .await
            .map_err(|e| RagError::Search(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Search(format!(
                "Search endpoint returned {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| RagError::Search(format!("Failed to read search response: {}", e)))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> RagResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RagError::Search("Query must not be empty".to_string()));
        }

        let start = Instant::now();
        let _permit = self.limiter.acquire().await?;

        debug!(query = %query, region = %self.config.region, "Fetching DuckDuckGo results");
        let html = with_timeout(self.fetch(query), self.config.timeout_ms, "web_search").await??;

        if html.contains("anomaly-modal") {
            warn!(query = %query, "DuckDuckGo returned a CAPTCHA page");
            return Err(RagError::Search(
                "DuckDuckGo CAPTCHA triggered; search temporarily blocked".to_string(),
            ));
        }

        let max_results = self.config.max_results.clamp(1, MAX_RESULTS_CAP);
        let hits = self.parser.parse(&html, max_results);
        debug!(
            query = %query,
            hits = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }
}

/// Extracts hits from DuckDuckGo result markup
struct HitParser {
    title_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

impl HitParser {
    fn new() -> RagResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| RagError::Config(format!("Invalid pattern: {}", e)))
        };

        // <a class="result__a" href="...">TITLE</a> ... <a class="result__snippet">SNIPPET</a>
        Ok(Self {
            title_re: compile(r#"<a[^>]+class="result__a"[^>]+href="([^"]*)"[^>]*>(.*?)</a>"#)?,
            snippet_re: compile(r#"<a[^>]+class="result__snippet"[^>]*>(.*?)</a>"#)?,
            tag_re: compile(r"<[^>]+>")?,
        })
    }

    /// Hits with a URL and title, first occurrence of each URL only
    fn parse(&self, html: &str, max_results: usize) -> Vec<SearchHit> {
        let snippets: Vec<String> = self
            .snippet_re
            .captures_iter(html)
            .map(|cap| self.strip_tags(cap.get(1).map_or("", |m| m.as_str())))
            .collect();

        let mut seen = HashSet::new();
        self.title_re
            .captures_iter(html)
            .enumerate()
            .map(|(i, cap)| SearchHit {
                url: extract_real_url(cap.get(1).map_or("", |m| m.as_str())),
                title: self.strip_tags(cap.get(2).map_or("", |m| m.as_str())),
                snippet: snippets.get(i).cloned().unwrap_or_default(),
            })
            .filter(|hit| !hit.url.is_empty() && !hit.title.is_empty())
            .filter(|hit| seen.insert(hit.url.clone()))
            .take(max_results)
            .collect()
    }

    /// Remove tags and decode common entities
    fn strip_tags(&self, s: &str) -> String {
        self.tag_re
            .replace_all(s, "")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&nbsp;", " ")
            .trim()
            .to_string()
    }
}

/// DuckDuckGo wraps URLs in a redirect: `//duckduckgo.com/l/?uddg=REAL_URL&...`
fn extract_real_url(raw: &str) -> String {
    match raw.find("uddg=") {
        Some(pos) => {
            let rest = &raw[pos + 5..];
            let end = rest.find('&').unwrap_or(rest.len());
            urlencoding::decode(&rest[..end])
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| rest[..end].to_string())
        }
        None => raw.to_string(),
    }
}

/// Give each hit of task `ordinal` the short reference `src://{ordinal}-{i}/`.
///
/// The trailing slash keeps `src://0-1/` from being a prefix of `src://0-10/`.
pub fn assign_short_refs(ordinal: u64, hits: &[SearchHit]) -> Vec<SourceRecord> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            SourceRecord::new(format!("src://{}-{}/", ordinal, i), hit.url.clone())
                .with_label(hit.title.clone())
        })
        .collect()
}
