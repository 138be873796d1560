//! LLM client integration using siumai
//!
//! A siumai client is bound to one model when it is built, while a research
//! run uses a query model and a reasoning model that can change per run. The
//! pool builds one client per model on first use and reuses it afterwards.

use crate::types::{RagError, RagResult, TextGenerator};
use async_trait::async_trait;
use prosearch_core::{retry_async, ErrorContext, LlmConfig, ProsearchError, RetryConfig};
use siumai::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A siumai client bound to one provider and model
pub struct ProsearchLlmClient {
    client: Box<dyn LlmClient>,
    provider: String,
    model: String,
    retry: RetryConfig,
}

impl ProsearchLlmClient {
    pub async fn new(config: &LlmConfig, model: &str) -> RagResult<Self> {
        let client = Self::build_client(config, model).await?;

        info!(
            provider = %config.provider,
            model = %model,
            "Created LLM client"
        );

        Ok(Self {
            client,
            provider: config.provider.clone(),
            model: model.to_string(),
            retry: RetryConfig::with_retries(config.max_retries),
        })
    }

    /// Build the appropriate siumai client based on configuration
    async fn build_client(config: &LlmConfig, model: &str) -> RagResult<Box<dyn LlmClient>> {
        let api_key = resolve_api_key(config)?.unwrap_or_default();

        match config.provider.as_str() {
            "openai" => {
                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| RagError::Llm(format!("Failed to build OpenAI client: {}", e)))?;

                Ok(Box::new(client))
            }
            "anthropic" => {
                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder.build().await.map_err(|e| {
                    RagError::Llm(format!("Failed to build Anthropic client: {}", e))
                })?;

                Ok(Box::new(client))
            }
            "ollama" => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(model)
                    .base_url(&base_url)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| RagError::Llm(format!("Failed to build Ollama client: {}", e)))?;

                Ok(Box::new(client))
            }
            "groq" => {
                let mut builder = LlmBuilder::new()
                    .groq()
                    .api_key(&api_key)
                    .model(model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| RagError::Llm(format!("Failed to build Groq client: {}", e)))?;

                Ok(Box::new(client))
            }
            provider => Err(RagError::Config(format!(
                "Unsupported LLM provider: {}",
                provider
            ))),
        }
    }

    /// Generate a response, retrying transient failures
    pub async fn generate(&self, messages: Vec<ChatMessage>) -> RagResult<String> {
        let start_time = Instant::now();

        debug!(
            model = %self.model,
            messages = messages.len(),
            "Generating response"
        );

        let response = retry_async(
            || {
                let messages = messages.clone();
                async move {
                    self.client
                        .chat(messages)
                        .await
                        .map_err(|e| ProsearchError::Llm {
                            message: e.to_string(),
                            provider: Some(self.provider.clone()),
                            model: Some(self.model.clone()),
                            context: ErrorContext::new("llm_client").with_operation("chat"),
                        })
                }
            },
            &self.retry,
            "llm_chat",
        )
        .await
        .map_err(|e| RagError::Llm(format!("LLM generation failed: {}", e)))?;

        match response.content_text() {
            Some(content) => {
                info!(
                    model = %self.model,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    chars = content.len(),
                    "Generated response"
                );
                Ok(content.to_string())
            }
            None => Err(RagError::Llm("No text content in LLM response".to_string())),
        }
    }

    /// Generate a response with an optional system message and a user message
    pub async fn generate_with_system(
        &self,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> RagResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = system_prompt {
            messages.push(system!(system_prompt));
        }
        messages.push(user!(user_message));

        self.generate(messages).await
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

/// API key for the configured provider: the configured key, else the
/// provider's environment variable. Ollama needs none.
pub fn resolve_api_key(config: &LlmConfig) -> RagResult<Option<String>> {
    let (env_var, label) = match config.provider.as_str() {
        "openai" => ("OPENAI_API_KEY", "OpenAI"),
        "anthropic" => ("ANTHROPIC_API_KEY", "Anthropic"),
        "groq" => ("GROQ_API_KEY", "Groq"),
        "ollama" => return Ok(None),
        provider => {
            return Err(RagError::Config(format!(
                "Unsupported LLM provider: {}",
                provider
            )))
        }
    };

    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok())
        .map(Some)
        .ok_or_else(|| {
            RagError::Config(format!(
                "{} API key not found (set llm.api_key or {})",
                label, env_var
            ))
        })
}

/// Clients for every model a process uses, built lazily per model
pub struct LlmClientPool {
    config: LlmConfig,
    clients: Mutex<HashMap<String, Arc<ProsearchLlmClient>>>,
}

impl LlmClientPool {
    /// Checks credentials up front so a missing key fails before any run starts
    pub fn new(config: LlmConfig) -> RagResult<Self> {
        resolve_api_key(&config)?;
        Ok(Self {
            config,
            clients: Mutex::new(HashMap::new()),
        })
    }

    pub async fn client(&self, model: &str) -> RagResult<Arc<ProsearchLlmClient>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(model) {
            return Ok(client.clone());
        }

        let client = Arc::new(ProsearchLlmClient::new(&self.config, model).await?);
        clients.insert(model.to_string(), client.clone());
        Ok(client)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for LlmClientPool {
    async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> RagResult<String> {
        let client = self.client(model).await?;
        client.generate_with_system(system, prompt).await
    }
}
