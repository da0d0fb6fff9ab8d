//! Specialist and doctor lookups backed by stored procedures.

mod cell;
pub mod postgres;

pub use cell::Cell;
pub use postgres::PgLookup;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("malformed row: {0}")]
    Malformed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Maps symptom terms to the specialist categories that treat them.
pub trait SpecialistLookup {
    async fn specialists_for(&self, symptoms: &[String]) -> Result<Vec<String>, LookupError>;
}

/// Fetches doctors, with their next open slot, for a set of specialist categories.
pub trait DoctorLookup {
    async fn doctors_for(&self, specialists: &[String]) -> Result<Vec<DoctorRow>, LookupError>;
}

/// A doctor identifier as the lookup stores it: integer keys stay numbers,
/// anything else (such as `D-17`) is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DoctorId {
    Int(i64),
    Text(String),
}

impl Default for DoctorId {
    fn default() -> Self {
        DoctorId::Int(0)
    }
}

impl std::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoctorId::Int(v) => write!(f, "{v}"),
            DoctorId::Text(s) => f.write_str(s),
        }
    }
}

/// One doctor row as returned by the lookup, before defaults are applied.
///
/// Columns, in order: doctor id, name, specialization, rating, fees, hospital,
/// next available date, slot start time, slot end time, slot id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorRow {
    pub doctor_id: DoctorId,
    pub name: String,
    pub specialization: String,
    pub rating: Option<f64>,
    pub fees: Option<i64>,
    pub hospital: Option<String>,
    pub next_available_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_id: Option<i64>,
}

pub const DOCTOR_COLUMNS: usize = 10;

impl DoctorRow {
    pub fn from_cells(cells: Vec<Cell>) -> Result<Self, LookupError> {
        if cells.len() < DOCTOR_COLUMNS {
            return Err(LookupError::Malformed(format!(
                "expected {DOCTOR_COLUMNS} columns, got {}",
                cells.len()
            )));
        }
        let mut cells = cells.into_iter();
        let mut next = || cells.next().unwrap_or(Cell::Null);

        let doctor_id = match next() {
            Cell::Int(v) => DoctorId::Int(v),
            other => other
                .into_text()
                .map(DoctorId::Text)
                .ok_or_else(|| LookupError::Malformed("doctor id is missing".into()))?,
        };
        let name = next()
            .into_text()
            .ok_or_else(|| LookupError::Malformed("doctor name is missing".into()))?;
        let specialization = next()
            .into_text()
            .ok_or_else(|| LookupError::Malformed("specialization is missing".into()))?;

        Ok(Self {
            doctor_id,
            name,
            specialization,
            rating: next().as_float(),
            fees: next().as_int(),
            hospital: next().into_text(),
            next_available_date: next().into_text(),
            start_time: next().into_text(),
            end_time: next().into_text(),
            slot_id: next().as_int(),
        })
    }
}

/// Decodes each row on its own; a row that cannot be read is logged and
/// dropped so the rest of the result still reaches the caller.
pub fn decode_doctor_rows<I>(rows: I) -> Vec<DoctorRow>
where
    I: IntoIterator<Item = Result<Vec<Cell>, LookupError>>,
{
    rows.into_iter()
        .filter_map(|cells| match cells.and_then(DoctorRow::from_cells) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(error = %e, "skipping malformed doctor row");
                None
            }
        })
        .collect()
}
