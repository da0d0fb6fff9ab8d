use tracing::{info, warn};

use super::comma_terms;
use crate::llm::{ChatClient, ChatMessage};

const SYSTEM_PROMPT: &str = "You are an intelligent medical assistant that triages patients.";
const FALLBACK_PICKS: usize = 2;

fn build_prompt(symptoms: &[String], specialists: &[String]) -> String {
    format!(
        "You are a medical assistant. A patient reported the following symptoms: {}.\n\
         The following specialists are available: {}.\n\
         From this list, which 1 or 2 specialists would be most suitable to consult first?\n\
         Only return the recommended specialist names as a comma-separated list.",
        symptoms.join(", "),
        specialists.join(", "),
    )
}

/// Asks the model which candidates to see first.
///
/// Only names that appear verbatim in `specialists` survive, since doctor lookups
/// match categories exactly. The count is not capped: every valid name the model
/// returns is kept. If the call fails, the first two candidates are used.
pub async fn rank_specialists(
    llm: &impl ChatClient,
    symptoms: &[String],
    specialists: &[String],
) -> Vec<String> {
    if specialists.is_empty() || symptoms.is_empty() {
        warn!("missing specialists or symptoms for recommendation");
        return Vec::new();
    }

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(symptoms, specialists)),
    ];

    match llm.complete(&messages).await {
        Ok(text) => {
            let recommended = pick_candidates(&text, specialists);
            info!(?recommended, "recommended specialists");
            recommended
        }
        Err(e) => {
            warn!(error = %e, "specialist ranking failed");
            let fallback: Vec<String> = specialists.iter().take(FALLBACK_PICKS).cloned().collect();
            info!(?fallback, "using fallback recommendations");
            fallback
        }
    }
}

fn pick_candidates(text: &str, specialists: &[String]) -> Vec<String> {
    comma_terms(text)
        .filter(|name| specialists.iter().any(|s| s.as_str() == *name))
        .map(str::to_string)
        .collect()
}
