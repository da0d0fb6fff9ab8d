use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ApiKey, ChatClient, ChatMessage, LlmError, classify_status, failed_response,
    temperature_from_env,
};
use crate::config::{self, ConfigError};

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Client for the OpenAI chat-completions API, or any server speaking it.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: Option<ApiKey>,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAiClient {
    /// Builds a client from `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL` and
    /// `LLM_TEMPERATURE`. A missing key is not an error here: every call then fails
    /// with `ApiKeyNotSet` and the stages fall back.
    pub fn from_env(http: Client) -> Result<Self, LlmError> {
        let api_key = config::env_var("OPENAI_API_KEY").map(ApiKey);
        if api_key.is_none() {
            warn!("OPENAI_API_KEY not set; model calls will use fallbacks");
        }
        let model = config::env_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = match config::env_var("OPENAI_BASE_URL") {
            Some(raw) => validate_base_url(&raw)?,
            None => API_BASE.to_string(),
        };
        Ok(Self {
            http,
            api_key,
            model,
            base_url,
            temperature: temperature_from_env()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Some(ApiKey("test-key".to_string())),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            temperature: super::DEFAULT_TEMPERATURE,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "OPENAI_BASE_URL",
        value: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("must be HTTP(S)".to_string()));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

impl ChatClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(LlmError::ApiKeyNotSet("OPENAI_API_KEY"))?;
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = failed_response(response, |status, text| {
                serde_json::from_str::<ErrorBody>(text)
                    .ok()
                    .and_then(|b| b.error)
                    .and_then(|e| e.message)
                    .map(|message| classify_status(status, message))
            })
            .await;
            warn!(error = %err, "chat completion failed");
            return Err(err);
        }

        let body: ChatCompletionResponse = response.json().await?;
        if let Some(err) = body.error {
            let message = err.message.unwrap_or_else(|| "Unknown error".to_string());
            warn!(%message, "OpenAI error in 200 response");
            return Err(LlmError::Api { code: 200, message });
        }

        debug!(model = %self.model, "chat completion complete");
        extract_content(body)
    }
}

fn extract_content(body: ChatCompletionResponse) -> Result<String, LlmError> {
    body.choices
        .into_iter()
        .flatten()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}
