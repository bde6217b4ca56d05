//! OpenRouter (OpenAI-compatible) chat-completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use outreach_shared::OpenRouterConfig;

use crate::error::GenerationError;
use crate::ports::{Generation, GenerationRequest, GenerationTask, TextGenerator};

/// Upper bound on completion length. Two 120-word emails fit comfortably.
const MAX_TOKENS: u32 = 1024;

/// Generation capability backed by the OpenRouter API.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    config: OpenRouterConfig,
    api_key: String,
}

impl OpenRouterClient {
    /// Create a client, reading the API key from the env var named in config.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config.clone(), api_key)
    }

    /// Create a client with an explicit API key.
    pub fn new(config: OpenRouterConfig, api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::ConnectionFailed(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.default_model,
            "initialized OpenRouter client"
        );

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Model for a task: per-task override, else the default.
    pub fn model_for(&self, task: GenerationTask) -> &str {
        let override_model = match task {
            GenerationTask::Copy => self.config.models.copy.as_deref(),
            GenerationTask::Qa => self.config.models.qa.as_deref(),
        };
        override_model.unwrap_or(&self.config.default_model)
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    #[instrument(skip_all, fields(task = request.task.as_str(), model = tracing::field::Empty))]
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        let model = self.model_for(request.task).to_string();
        tracing::Span::current().record("model", model.as_str());

        let body = ChatRequest {
            model: &model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.task.temperature(),
            max_tokens: MAX_TOKENS,
        };

        debug!(prompt_len = request.prompt.len(), "sending chat completion request");
        let started = Instant::now();

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "chat completion request failed");
            return Err(GenerationError::ServerError {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("reply carried no text".into()))?;

        let usage = reply.usage.unwrap_or_default();
        let latency_ms = started.elapsed().as_millis() as u64;

        info!(
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            latency_ms,
            "generation complete"
        );

        Ok(Generation {
            text,
            model: reply.model.unwrap_or(model),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            latency_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
