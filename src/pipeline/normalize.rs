use tracing::{info, warn};

use super::comma_terms;
use crate::llm::{ChatClient, ChatMessage};

const SYSTEM_PROMPT: &str = "You are a helpful medical assistant.";

fn build_prompt(phrases: &[String]) -> String {
    format!(
        "You are a medical assistant. Normalize the following patient symptom phrases \
         into a list of clinical symptom terms. Only output comma-separated clinical terms.\n\
         Patient phrases: {phrases:?}"
    )
}

/// Turns raw patient phrases into lowercase clinical terms.
///
/// When the model call fails, each phrase is trimmed and lowercased as-is so no
/// input is lost.
pub async fn normalize_symptoms(llm: &impl ChatClient, phrases: &[String]) -> Vec<String> {
    if phrases.is_empty() {
        warn!("no phrases to normalize");
        return Vec::new();
    }

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(phrases)),
    ];

    match llm.complete(&messages).await {
        Ok(text) => {
            let normalized: Vec<String> = comma_terms(&text).map(str::to_lowercase).collect();
            info!(?normalized, "normalized symptoms");
            normalized
        }
        Err(e) => {
            warn!(error = %e, "symptom normalization failed");
            let fallback = fallback_terms(phrases);
            info!(?fallback, "using fallback normalization");
            fallback
        }
    }
}

fn fallback_terms(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect()
}
