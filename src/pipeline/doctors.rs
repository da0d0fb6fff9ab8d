use tracing::{info, warn};

use super::state::Doctor;
use crate::lookup::DoctorLookup;

pub async fn resolve_doctors(lookup: &impl DoctorLookup, recommended: &[String]) -> Vec<Doctor> {
    if recommended.is_empty() {
        warn!("no recommended specialists to fetch doctors for");
        return Vec::new();
    }

    info!(?recommended, "fetching doctors");
    match lookup.doctors_for(recommended).await {
        Ok(rows) => {
            let doctors: Vec<Doctor> = rows.into_iter().map(Doctor::from).collect();
            info!(count = doctors.len(), "fetched doctors");
            doctors
        }
        Err(e) => {
            warn!(error = %e, "doctor lookup failed");
            Vec::new()
        }
    }
}
