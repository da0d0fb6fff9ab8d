use tracing::{debug, info, warn};

use crate::lookup::SpecialistLookup;

/// Finds the specialist categories matching the normalized symptoms.
/// An empty result is a normal outcome; lookup failures also yield one.
pub async fn resolve_specialists(lookup: &impl SpecialistLookup, symptoms: &[String]) -> Vec<String> {
    if symptoms.is_empty() {
        warn!("no normalized symptoms to look up");
        return Vec::new();
    }

    debug!(?symptoms, "looking up specialists");
    match lookup.specialists_for(symptoms).await {
        Ok(specialists) => {
            info!(?specialists, "found specialists");
            specialists
        }
        Err(e) => {
            warn!(error = %e, "specialist lookup failed");
            Vec::new()
        }
    }
}
