use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ApiKey, ChatClient, ChatMessage, LlmError, Role, failed_response, temperature_from_env,
};
use crate::config;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: Option<String>,
}

/// Client for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<ApiKey>,
    model: String,
    base_url: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn from_env(http: Client) -> Result<Self, LlmError> {
        let api_key = config::env_var("GEMINI_API_KEY").map(ApiKey);
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set; model calls will use fallbacks");
        }
        let model = config::env_var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self {
            http,
            api_key,
            model,
            base_url: API_BASE.to_string(),
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

impl ChatClient for GeminiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(LlmError::ApiKeyNotSet("GEMINI_API_KEY"))?;
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&build_request(messages, self.temperature))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = failed_response(response, |_, text| {
                serde_json::from_str::<GenerateContentResponse>(text)
                    .ok()
                    .and_then(|body| body.error)
                    .map(|err| classify_api_error(&err))
            })
            .await;
            warn!(error = %err, "Gemini API error");
            return Err(err);
        }

        let body: GenerateContentResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err);
            warn!(error = %classified, "Gemini API error in 200 response");
            return Err(classified);
        }

        debug!(model = %self.model, "gemini completion complete");
        extract_text(&body)
    }
}

/// System messages become the system instruction; the rest map onto Gemini's
/// `user` / `model` turn roles.
fn build_request(messages: &[ChatMessage], temperature: f32) -> GenerateContentRequest {
    let system: Vec<Part> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| Part {
            text: m.content.clone(),
        })
        .collect();

    let contents = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::System => return None,
                Role::User => "user",
                Role::Assistant => "model",
            };
            Some(Content {
                parts: vec![Part {
                    text: m.content.clone(),
                }],
                role: Some(role.to_string()),
            })
        })
        .collect();

    GenerateContentRequest {
        system_instruction: (!system.is_empty()).then_some(Content {
            parts: system,
            role: None,
        }),
        contents,
        generation_config: GenerationConfig { temperature },
    }
}

fn extract_text(response: &GenerateContentResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .iter()
        .flatten()
        .next()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

fn classify_api_error(err: &ApiError) -> LlmError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match err.code {
        Some(429) => LlmError::RateLimited,
        Some(401) => LlmError::Unauthorized(message),
        Some(403) => LlmError::QuotaExhausted(message),
        Some(code) => LlmError::Api { code, message },
        None => LlmError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}
