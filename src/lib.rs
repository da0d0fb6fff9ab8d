//! Symptom triage: turn free-text patient phrases into recommended specialists and
//! the doctors available to see them.
//!
//! ```text
//! phrases ─► normalize (LLM) ─► specialists (lookup) ─► rank (LLM) ─► doctors (lookup)
//! ```
//!
//! Every stage has its own fallback, so [`Pipeline::run_pipeline`] always returns a
//! complete [`PipelineResult`], possibly with empty fields.

pub mod config;
pub mod llm;
pub mod lookup;
pub mod pipeline;

pub use pipeline::{Doctor, Pipeline, PipelineError, PipelineResult};

pub const USER_AGENT: &str = concat!("symptom-triage/", env!("CARGO_PKG_VERSION"));
