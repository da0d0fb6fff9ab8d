use serde::{Deserialize, Serialize};

use crate::lookup::{DoctorId, DoctorRow};

pub const NO_DATE: &str = "Not available";
pub const NO_TIME: &str = "N/A";

/// A doctor with an open slot, ready to show to the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: DoctorId,
    pub name: String,
    pub specialization: String,
    pub rating: f64,
    pub fees: i64,
    pub hospital: Option<String>,
    pub next_available_date: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_id: Option<i64>,
}

impl From<DoctorRow> for Doctor {
    fn from(row: DoctorRow) -> Self {
        Self {
            doctor_id: row.doctor_id,
            name: row.name,
            specialization: row.specialization,
            rating: row.rating.unwrap_or(0.0),
            fees: row.fees.unwrap_or(0),
            hospital: row.hospital,
            next_available_date: or_sentinel(row.next_available_date, NO_DATE),
            start_time: or_sentinel(row.start_time, NO_TIME),
            end_time: or_sentinel(row.end_time, NO_TIME),
            slot_id: row.slot_id,
        }
    }
}

fn or_sentinel(value: Option<String>, sentinel: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| sentinel.to_string())
}

/// Everything one pipeline run knows about a request.
///
/// Each stage fills exactly one field through a [`StateDelta`]; fields a stage
/// never reached stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub phrases: Vec<String>,
    pub normalized_symptoms: Vec<String>,
    pub specialists: Vec<String>,
    pub recommended_specialists: Vec<String>,
    pub doctors: Vec<Doctor>,
}

/// The final state handed back to the caller.
pub type PipelineResult = PipelineState;

/// The single field a stage writes.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    NormalizedSymptoms(Vec<String>),
    Specialists(Vec<String>),
    RecommendedSpecialists(Vec<String>),
    Doctors(Vec<Doctor>),
}

impl PipelineState {
    pub fn new(phrases: Vec<String>) -> Self {
        Self {
            phrases,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn apply(self, delta: StateDelta) -> Self {
        match delta {
            StateDelta::NormalizedSymptoms(normalized_symptoms) => Self {
                normalized_symptoms,
                ..self
            },
            StateDelta::Specialists(specialists) => Self {
                specialists,
                ..self
            },
            StateDelta::RecommendedSpecialists(recommended_specialists) => Self {
                recommended_specialists,
                ..self
            },
            StateDelta::Doctors(doctors) => Self { doctors, ..self },
        }
    }
}
