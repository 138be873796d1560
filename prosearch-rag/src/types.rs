//! Error types and shared seams for the RAG collaborators

use async_trait::async_trait;
use prosearch_core::{ErrorContext, ProsearchError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Failed to parse model output: {0}")]
    Parse(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(Box<ProsearchError>),
}

impl From<ProsearchError> for RagError {
    fn from(err: ProsearchError) -> Self {
        RagError::Core(Box::new(err))
    }
}

pub type RagResult<T> = Result<T, RagError>;

/// Workflow step a collaborator error is reported against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    QueryGeneration,
    Search,
    Reflection,
    Answer,
}

impl Stage {
    fn operation(self) -> &'static str {
        match self {
            Stage::QueryGeneration => "generate_queries",
            Stage::Search => "web_research",
            Stage::Reflection => "reflect",
            Stage::Answer => "write_answer",
        }
    }
}

impl RagError {
    /// Convert into the workflow error for `stage`.
    ///
    /// Configuration problems stay configuration errors whatever the stage.
    pub fn at_stage(self, stage: Stage) -> ProsearchError {
        let context = ErrorContext::new("prosearch_rag").with_operation(stage.operation());

        let err = match self {
            RagError::Config(message) => {
                return ProsearchError::Config {
                    message,
                    source: None,
                    context,
                }
            }
            RagError::Core(inner) if matches!(*inner, ProsearchError::Config { .. }) => {
                return *inner
            }
            other => other,
        };

        let message = err.to_string();
        let source: Option<Box<dyn std::error::Error + Send + Sync>> = Some(Box::new(err));
        match stage {
            Stage::QueryGeneration => ProsearchError::QueryGeneration {
                message,
                source,
                context,
            },
            Stage::Search => ProsearchError::Search {
                message,
                source,
                context,
            },
            Stage::Reflection => ProsearchError::Reflection {
                message,
                source,
                context,
            },
            Stage::Answer => ProsearchError::Answer {
                message,
                source,
                context,
            },
        }
    }
}

/// Produces text from a prompt with a named model
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, model: &str, system: Option<&str>, prompt: &str)
        -> RagResult<String>;
}
