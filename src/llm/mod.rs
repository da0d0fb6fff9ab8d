//! Chat-completion clients used by the normalizing and ranking stages.

pub mod gemini;
pub mod openai;

use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::config::{self, ConfigError};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Default sampling temperature. Kept low so repeated runs stay close to deterministic.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0} not set")]
    ApiKeyNotSet(&'static str),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A language model that answers a role-tagged conversation with one text reply.
/// Implemented by `OpenAiClient` and `GeminiClient`; scripted fakes are used in tests.
pub trait ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub(crate) struct ApiKey(pub(crate) String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Validates a sampling temperature read from the environment.
pub(crate) fn temperature_from_env() -> Result<f32, ConfigError> {
    let value = config::parse_or("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?;
    check_temperature(value)
}

fn check_temperature(value: f32) -> Result<f32, ConfigError> {
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var: "LLM_TEMPERATURE",
            value: value.to_string(),
            reason: "must be between 0.0 and 2.0".to_string(),
        })
    }
}

/// Truncates an error body for inclusion in an error message.
pub(crate) fn snippet(text: &str) -> &str {
    if text.len() > 200 {
        &text[..text.floor_char_boundary(200)]
    } else {
        text
    }
}

/// Turns a non-success response into an error.
///
/// `structured` gets the status and raw body and returns an error when the provider's JSON
/// error shape is present; otherwise the status decides, with a body snippet as
/// the message.
pub(crate) async fn failed_response(
    response: Response,
    structured: impl FnOnce(StatusCode, &str) -> Option<LlmError>,
) -> LlmError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited;
    }
    let text = response.text().await.unwrap_or_default();
    structured(status, &text)
        .unwrap_or_else(|| classify_status(status, format!("HTTP {status}: {}", snippet(&text))))
}

pub(crate) fn classify_status(status: StatusCode, message: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED => LlmError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        _ => LlmError::Api {
            code: status.as_u16(),
            message,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{other}', expected 'openai' or 'gemini'")),
        }
    }
}

/// The chat client selected by `LLM_PROVIDER`.
#[derive(Debug, Clone)]
pub enum LlmClient {
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
}

impl LlmClient {
    pub fn from_env(http: reqwest::Client) -> Result<Self, LlmError> {
        let provider = config::parse_or("LLM_PROVIDER", Provider::OpenAi)?;
        let client = match provider {
            Provider::OpenAi => LlmClient::OpenAi(OpenAiClient::from_env(http)?),
            Provider::Gemini => LlmClient::Gemini(GeminiClient::from_env(http)?),
        };
        info!(provider = ?provider, model = client.model(), "chat client configured");
        Ok(client)
    }

    pub fn model(&self) -> &str {
        match self {
            LlmClient::OpenAi(c) => c.model(),
            LlmClient::Gemini(c) => c.model(),
        }
    }
}

impl ChatClient for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        match self {
            LlmClient::OpenAi(c) => c.complete(messages).await,
            LlmClient::Gemini(c) => c.complete(messages).await,
        }
    }
}
