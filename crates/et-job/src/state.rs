//! Persisted job state.
//!
//! The host stores this between invocations; nothing else survives. Each
//! step deserializes the previous state, does one phase's work, and hands
//! back the next state to persist.

use serde::{Deserialize, Serialize};

use et_operators::{BaseSettings, SerializedBundle};
use et_types::TuneResult;

/// Lifecycle phase of a tuning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Init,
    AwaitingConfiguration,
    Running,
    Finalizing,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::AwaitingConfiguration => "awaiting_configuration",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of the most recently completed run, kept for display and as the
/// precondition for finishing the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generation_count: u64,
    pub best_fitness: f64,
}

/// Everything the job persists between invocations.
///
/// In `Init` only the phase is present. From `AwaitingConfiguration` on, the
/// operator bundle is always present in full; families are never persisted
/// piecemeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub phase: JobPhase,
    #[serde(default)]
    pub operators: Option<SerializedBundle>,
    #[serde(default)]
    pub base: Option<BaseSettings>,
    /// Serialized [`et_types::ClassifierState`] blob.
    #[serde(default)]
    pub classifier_state: Option<String>,
    #[serde(default)]
    pub num_features: Option<usize>,
    #[serde(default)]
    pub run_summary: Option<RunSummary>,
}

impl JobState {
    /// State of a job that has never run: phase `Init`, nothing else.
    pub fn new() -> Self {
        Self {
            phase: JobPhase::Init,
            operators: None,
            base: None,
            classifier_state: None,
            num_features: None,
            run_summary: None,
        }
    }

    pub fn to_json(&self) -> TuneResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> TuneResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_holds_nothing_but_the_phase() {
        let state = JobState::new();
        assert_eq!(state.phase, JobPhase::Init);
        assert!(state.operators.is_none());
        assert!(state.base.is_none());
        assert!(state.run_summary.is_none());
    }

    #[test]
    fn json_round_trip() {
        let state = JobState {
            phase: JobPhase::AwaitingConfiguration,
            operators: Some(SerializedBundle::empty()),
            base: Some(BaseSettings::default()),
            classifier_state: Some(r#"{"k":1,"weights":[1.0],"selections":[true]}"#.into()),
            num_features: Some(1),
            run_summary: Some(RunSummary {
                generation_count: 40,
                best_fitness: 0.91,
            }),
        };

        let json = state.to_json().unwrap();
        let back = JobState::from_json(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn minimal_encoding_decodes_with_absent_fields() {
        let state = JobState::from_json(r#"{"phase": "init"}"#).unwrap();
        assert_eq!(state.phase, JobPhase::Init);
        assert!(state.operators.is_none());
        assert!(state.classifier_state.is_none());
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(JobPhase::Running.to_string(), "running");
        assert_eq!(
            JobPhase::AwaitingConfiguration.to_string(),
            "awaiting_configuration"
        );
    }
}
