//! Configuration management

use crate::error::{ErrorContext, ProsearchError, ProsearchResult};
use crate::types::*;

use std::path::Path;

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            initial_query_count: 3,
            max_research_loops: 2,
            query_model: "gpt-4o-mini".to_string(),
            reasoning_model: "gpt-4o".to_string(),
        }
    }
}

impl ResearchSettings {
    /// Apply per-run overrides on top of the process-wide defaults
    pub fn resolve(&self, overrides: &RunOverrides) -> RunSettings {
        RunSettings {
            initial_query_count: overrides
                .initial_query_count
                .unwrap_or(self.initial_query_count),
            max_research_loops: overrides
                .max_research_loops
                .unwrap_or(self.max_research_loops),
            query_model: overrides
                .query_model
                .clone()
                .unwrap_or_else(|| self.query_model.clone()),
            reasoning_model: overrides
                .reasoning_model
                .clone()
                .unwrap_or_else(|| self.reasoning_model.clone()),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            reference_pattern: r"第\s*\d+\s*條".to_string(),
            lookup_keywords: ["交通", "法規", "條例", "罰鍰", "罰款", "道路交通管理處罰條例"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: Some(4000),
            max_retries: 2,
            answer_system_prompt: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            region: "wt-wt".to_string(),
            timeout_ms: 15_000,
            max_concurrent: 4,
            min_interval_ms: 250,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            max_matches: 3,
        }
    }
}

impl ProsearchConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ProsearchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProsearchError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: ProsearchConfig =
            toml::from_str(&content).map_err(|e| ProsearchError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ProsearchResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ProsearchError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| ProsearchError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// A copy safe to print, with secrets masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(key) = config.llm.api_key.as_mut() {
            *key = "********".to_string();
        }
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> ProsearchResult<()> {
        if self.research.initial_query_count == 0 {
            return Err(invalid(
                "research.initial_query_count must be greater than 0",
                "Set research.initial_query_count to a positive value",
            ));
        }

        if self.research.query_model.trim().is_empty()
            || self.research.reasoning_model.trim().is_empty()
        {
            return Err(invalid(
                "research.query_model and research.reasoning_model must not be empty",
                "Name a model supported by the configured provider",
            ));
        }

        if let Err(e) = regex::Regex::new(&self.routing.reference_pattern) {
            return Err(ProsearchError::Config {
                message: format!("routing.reference_pattern is not a valid regex: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(
                "llm.temperature must be between 0.0 and 2.0",
                "Set llm.temperature to a value in [0.0, 2.0]",
            ));
        }

        if self.search.max_results == 0 || self.search.max_concurrent == 0 {
            return Err(invalid(
                "search.max_results and search.max_concurrent must be greater than 0",
                "Set both search limits to positive values",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str, suggestion: &str) -> ProsearchError {
    ProsearchError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}
