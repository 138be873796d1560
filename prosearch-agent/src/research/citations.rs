//! Citation resolution for the final answer

use prosearch_core::SourceRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Answer text with canonical citations and the sources it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnswer {
    pub text: String,
    pub sources: Vec<SourceRecord>,
}

/// Rewrites short references in generated text to their canonical values
pub struct CitationResolver;

impl CitationResolver {
    /// Replace every occurrence of each source's short reference and keep only
    /// the sources that were referenced. Sources are checked in the order given.
    pub fn resolve(raw: &str, sources: &[SourceRecord]) -> ResolvedAnswer {
        let mut text = raw.to_string();
        let mut used: Vec<SourceRecord> = Vec::new();

        for source in sources {
            if source.short_ref.is_empty() || !text.contains(&source.short_ref) {
                continue;
            }
            text = text.replace(&source.short_ref, &source.canonical_value);
            if !used.contains(source) {
                used.push(source.clone());
            }
        }

        debug!(
            gathered = sources.len(),
            cited = used.len(),
            "Resolved citations"
        );

        ResolvedAnswer { text, sources: used }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new("[1]", "https://example.org"),
            SourceRecord::new("[2]", "https://unused.example"),
        ]
    }

    #[test]
    fn test_referenced_source_is_substituted_and_kept() {
        let resolved = CitationResolver::resolve("Trails are steep [1].", &sources());

        assert_eq!(resolved.text, "Trails are steep https://example.org.");
        assert_eq!(
            resolved.sources,
            vec![SourceRecord::new("[1]", "https://example.org")]
        );
    }

    #[test]
    fn test_all_occurrences_replaced() {
        let resolved = CitationResolver::resolve("[1] and again [1]", &sources());
        assert_eq!(
            resolved.text,
            "https://example.org and again https://example.org"
        );
        assert_eq!(resolved.sources.len(), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let once = CitationResolver::resolve("See [1] and [2].", &sources());
        let twice = CitationResolver::resolve(&once.text, &sources());

        assert_eq!(twice.text, once.text);
        assert!(twice.sources.is_empty());
    }

    #[test]
    fn test_no_citations_prunes_everything() {
        let resolved = CitationResolver::resolve("Nothing cited here.", &sources());
        assert_eq!(resolved.text, "Nothing cited here.");
        assert!(resolved.sources.is_empty());
    }

    #[test]
    fn test_distinct_refs_with_shared_prefix() {
        let sources = vec![
            SourceRecord::new("src://0-1/", "https://one.example"),
            SourceRecord::new("src://0-10/", "https://ten.example"),
        ];
        let resolved = CitationResolver::resolve("[a](src://0-10/) [b](src://0-1/)", &sources);

        assert_eq!(
            resolved.text,
            "[a](https://ten.example) [b](https://one.example)"
        );
        assert_eq!(resolved.sources.len(), 2);
    }
}
