//! The four-stage triage chain: normalize -> resolve specialists -> rank -> resolve doctors.

mod doctors;
mod normalize;
mod rank;
mod specialists;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use doctors::resolve_doctors;
pub use normalize::normalize_symptoms;
pub use rank::rank_specialists;
pub use specialists::resolve_specialists;
pub use state::{Doctor, PipelineResult, PipelineState, StateDelta};

use tracing::{debug, info};

use crate::llm::ChatClient;
use crate::lookup::{DoctorLookup, SpecialistLookup};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no phrases provided")]
    NoPhrases,
}

/// A node of the chain. Runs always visit every stage in [`Stage::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    ResolveSpecialists,
    RankSpecialists,
    ResolveDoctors,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::Normalize,
        Stage::ResolveSpecialists,
        Stage::RankSpecialists,
        Stage::ResolveDoctors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::ResolveSpecialists => "resolve_specialists",
            Stage::RankSpecialists => "rank_specialists",
            Stage::ResolveDoctors => "resolve_doctors",
        }
    }
}

/// Runs the triage chain against injected collaborators.
///
/// Holds no per-run data, so one `Pipeline` can serve concurrent runs; each run
/// owns its own [`PipelineState`].
#[derive(Debug, Clone)]
pub struct Pipeline<C, S, D> {
    llm: C,
    specialists: S,
    doctors: D,
}

impl<C, S, D> Pipeline<C, S, D>
where
    C: ChatClient,
    S: SpecialistLookup,
    D: DoctorLookup,
{
    pub fn new(llm: C, specialists: S, doctors: D) -> Self {
        Self {
            llm,
            specialists,
            doctors,
        }
    }

    /// Runs every stage in order and returns the accumulated state.
    ///
    /// Never fails: stages absorb collaborator errors into their fallbacks, and an
    /// empty field simply makes the later stages short-circuit.
    pub async fn run_pipeline(&self, phrases: Vec<String>) -> PipelineResult {
        info!(phrases = phrases.len(), "running triage pipeline");
        let mut state = PipelineState::new(phrases);
        for stage in Stage::ORDER {
            debug!(stage = stage.name(), "stage start");
            let delta = self.run_stage(stage, &state).await;
            state = state.apply(delta);
        }
        info!(
            symptoms = state.normalized_symptoms.len(),
            specialists = state.specialists.len(),
            recommended = state.recommended_specialists.len(),
            doctors = state.doctors.len(),
            "triage pipeline finished"
        );
        state
    }

    /// Rejects an empty request before running the pipeline.
    pub async fn triage(&self, phrases: Vec<String>) -> Result<PipelineResult, PipelineError> {
        if phrases.is_empty() {
            return Err(PipelineError::NoPhrases);
        }
        Ok(self.run_pipeline(phrases).await)
    }

    async fn run_stage(&self, stage: Stage, state: &PipelineState) -> StateDelta {
        match stage {
            Stage::Normalize => {
                StateDelta::NormalizedSymptoms(normalize_symptoms(&self.llm, &state.phrases).await)
            }
            Stage::ResolveSpecialists => StateDelta::Specialists(
                resolve_specialists(&self.specialists, &state.normalized_symptoms).await,
            ),
            Stage::RankSpecialists => StateDelta::RecommendedSpecialists(
                rank_specialists(&self.llm, &state.normalized_symptoms, &state.specialists).await,
            ),
            Stage::ResolveDoctors => StateDelta::Doctors(
                resolve_doctors(&self.doctors, &state.recommended_specialists).await,
            ),
        }
    }
}

/// Splits a model reply on commas, trimming each piece and dropping empty ones.
fn comma_terms(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeDoctors, FakeSpecialists, ScriptedChat, doctor_row};

    fn phrases(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn happy_pipeline() -> Pipeline<ScriptedChat, FakeSpecialists, FakeDoctors> {
        Pipeline::new(
            ScriptedChat::replying(&["chest pain, palpitations", "Cardiology, Radiology"]),
            FakeSpecialists::returning(&["Cardiology", "Pulmonology", "General Medicine"]),
            FakeDoctors::returning(vec![doctor_row(1, "Dr. Rao", "Cardiology")]),
        )
    }

    #[test]
    fn comma_terms_trims_and_skips_empty() {
        let terms: Vec<&str> = comma_terms(" a, ,b ,,c ").collect();
        assert_eq!(terms, vec!["a", "b", "c"]);
        assert_eq!(comma_terms("").count(), 0);
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let names: Vec<&str> = Stage::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "normalize",
                "resolve_specialists",
                "rank_specialists",
                "resolve_doctors"
            ]
        );
    }

    #[tokio::test]
    async fn happy_path_fills_every_field() {
        let pipeline = happy_pipeline();
        let result = pipeline
            .run_pipeline(phrases(&["My chest hurts", "heart racing"]))
            .await;

        assert_eq!(result.phrases, vec!["My chest hurts", "heart racing"]);
        assert_eq!(result.normalized_symptoms, vec!["chest pain", "palpitations"]);
        assert_eq!(
            result.specialists,
            vec!["Cardiology", "Pulmonology", "General Medicine"]
        );
        assert_eq!(result.recommended_specialists, vec!["Cardiology"]);
        assert_eq!(result.doctors.len(), 1);
        assert_eq!(result.doctors[0].name, "Dr. Rao");

        assert_eq!(
            pipeline.specialists.seen(),
            vec![phrases(&["chest pain", "palpitations"])]
        );
        assert_eq!(pipeline.doctors.seen(), vec![phrases(&["Cardiology"])]);
    }

    #[tokio::test]
    async fn no_matching_specialists_skips_doctor_lookup() {
        let pipeline = Pipeline::new(
            ScriptedChat::replying(&["hiccups"]),
            FakeSpecialists::returning(&[]),
            FakeDoctors::returning(vec![doctor_row(1, "Dr. Rao", "Cardiology")]),
        );
        let result = pipeline.run_pipeline(phrases(&["can't stop hiccuping"])).await;

        assert_eq!(result.normalized_symptoms, vec!["hiccups"]);
        assert!(result.specialists.is_empty());
        assert!(result.recommended_specialists.is_empty());
        assert!(result.doctors.is_empty());
        assert_eq!(pipeline.doctors.calls(), 0);
        // the ranking model is never asked
        assert_eq!(pipeline.llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn every_collaborator_failing_still_returns_full_state() {
        let pipeline = Pipeline::new(
            ScriptedChat::failing(),
            FakeSpecialists::failing(),
            FakeDoctors::failing(),
        );
        let result = pipeline.run_pipeline(phrases(&["Dizzy "])).await;

        assert_eq!(result.phrases, vec!["Dizzy "]);
        assert_eq!(result.normalized_symptoms, vec!["dizzy"]);
        assert!(result.specialists.is_empty());
        assert!(result.recommended_specialists.is_empty());
        assert!(result.doctors.is_empty());

        let json = serde_json::to_value(&result).unwrap();
        for field in [
            "phrases",
            "normalized_symptoms",
            "specialists",
            "recommended_specialists",
            "doctors",
        ] {
            assert!(json[field].is_array(), "{field} should be an array");
        }
    }

    #[tokio::test]
    async fn ranking_failure_falls_back_and_still_fetches_doctors() {
        let pipeline = Pipeline::new(
            ScriptedChat::replying(&["headache"]),
            FakeSpecialists::returning(&["Neurology", "ENT", "Ophthalmology"]),
            FakeDoctors::returning(vec![doctor_row(4, "Dr. Kim", "Neurology")]),
        );
        let result = pipeline.run_pipeline(phrases(&["head pounding"])).await;

        assert_eq!(result.recommended_specialists, vec!["Neurology", "ENT"]);
        assert_eq!(pipeline.doctors.seen(), vec![phrases(&["Neurology", "ENT"])]);
        assert_eq!(result.doctors.len(), 1);
    }

    #[tokio::test]
    async fn identical_runs_serialize_identically() {
        let first = happy_pipeline()
            .run_pipeline(phrases(&["My chest hurts"]))
            .await;
        let second = happy_pipeline()
            .run_pipeline(phrases(&["My chest hurts"]))
            .await;

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn triage_rejects_empty_phrases() {
        let pipeline = happy_pipeline();
        let err = pipeline.triage(Vec::new()).await.unwrap_err();

        assert!(matches!(err, PipelineError::NoPhrases));
        assert!(pipeline.llm.calls().is_empty());
    }

    #[tokio::test]
    async fn triage_runs_pipeline_for_non_empty_input() {
        let pipeline = happy_pipeline();
        let result = pipeline.triage(phrases(&["chest pain"])).await.unwrap();

        assert_eq!(result.recommended_specialists, vec!["Cardiology"]);
    }
}
