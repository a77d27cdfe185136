use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Small-completion LLM used for classification tasks (hybrid mention
/// detection, intent classification). Implementations must be cheap to call
/// per utterance; failures are expected to be handled by the caller's
/// rules-based fallback.
#[async_trait::async_trait]
pub trait LlmProcessor: Send + Sync {
    /// Run a single system+user completion and return the raw reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Processor name for logging
    fn name(&self) -> &str;
}

/// Configuration for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL, with or without a trailing `/v1`
    pub api_url: String,
    /// Bearer token; empty for unauthenticated local servers
    #[serde(default)]
    pub api_key: String,
    /// Model identifier passed through to the server
    pub model: String,
    /// Sampling temperature (classification wants it low)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion cap; classification replies are tiny
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    256
}

/// LLM processor backed by any OpenAI-compatible chat completions API
/// (Azure OpenAI, Ollama, vLLM, llama.cpp server, etc.).
pub struct OpenAiCompatProcessor {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatProcessor {
    pub fn new(config: LlmConfig) -> Self {
        info!(
            "LLM processor configured: {} model={}",
            config.api_url, config.model
        );

        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        let base = self
            .config
            .api_url
            .strip_suffix("/v1")
            .unwrap_or(&self.config.api_url);
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl LlmProcessor for OpenAiCompatProcessor {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM returned error status")?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!("LLM completion: {} chars", content.len());

        Ok(content)
    }

    fn name(&self) -> &str {
        "openai-compat"
    }
}
