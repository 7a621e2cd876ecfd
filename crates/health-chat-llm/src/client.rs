//! Completion and moderation client for OpenAI-compatible APIs.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// LLM client errors.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// One-shot text completion.
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` as a single user message and return the trimmed reply.
    fn complete(&self, prompt: &str) -> impl Future<Output = LlmResult<String>> + Send;
}

/// Content moderation check.
pub trait ContentModerator: Send + Sync {
    /// True when the text should not be answered.
    fn is_flagged(&self, text: &str) -> impl Future<Output = LlmResult<bool>> + Send;
}

/// Settings for the completion client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Build a config for `provider`. Only `openai` is supported.
    pub fn new(provider: &str, model: &str, api_key: &str) -> LlmResult<Self> {
        if provider != DEFAULT_PROVIDER {
            return Err(LlmError::Config(format!(
                "Unsupported LLM provider: {}",
                provider
            )));
        }
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("API key cannot be empty".into()));
        }

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
}

/// HTTP client for `/chat/completions` and `/moderations`.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> LlmResult<R> {
        let url = format!("{}/{}", self.config.base_url, path);
        debug!(%url, model = %self.config.model, "Calling LLM API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;
        first_choice_content(response)
    }
}

impl ContentModerator for OpenAiClient {
    async fn is_flagged(&self, text: &str) -> LlmResult<bool> {
        let response: ModerationResponse =
            self.post("moderations", &ModerationRequest { input: text }).await?;
        first_flag(response)
    }
}

fn first_choice_content(response: ChatResponse) -> LlmResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse("No message content in completion".into()))
}

fn first_flag(response: ModerationResponse) -> LlmResult<bool> {
    response
        .results
        .first()
        .map(|result| result.flagged)
        .ok_or_else(|| LlmError::InvalidResponse("No results in moderation response".into()))
}
