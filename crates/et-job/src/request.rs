//! Operator-facing configuration requests and their validation.
//!
//! Validation never panics and never mutates the incoming state: it either
//! produces the next state to persist or a [`ConfigRejection`] value the
//! host can show the operator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use et_operators::{
    BaseSettings, CrossoverSettings, MethodEntry, MutationSettings, OperatorBundle,
    ReplacementSettings, SelectionSettings, SingleMethodForm, StopCriteriaSettings,
};

use crate::state::{JobPhase, JobState};

pub const REQUEST_START: &str = "start";
pub const REQUEST_FINISH: &str = "finish";

/// A structured request submitted by the operator while the job is awaiting
/// configuration. Family payloads use the same entry shapes as the durable
/// forms; feature-sized parameters are filled from the job, not the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRequest {
    pub method: String,
    #[serde(default)]
    pub base: Option<BaseSettings>,
    #[serde(default)]
    pub selection: SingleMethodForm,
    #[serde(default)]
    pub replacement: SingleMethodForm,
    #[serde(default)]
    pub mutation: Vec<MethodEntry>,
    #[serde(default)]
    pub crossover: Vec<MethodEntry>,
    #[serde(default)]
    pub stop_criteria: Vec<MethodEntry>,
}

impl ConfigurationRequest {
    pub fn start() -> Self {
        Self {
            method: REQUEST_START.to_string(),
            base: None,
            selection: SingleMethodForm::empty(),
            replacement: SingleMethodForm::empty(),
            mutation: Vec::new(),
            crossover: Vec::new(),
            stop_criteria: Vec::new(),
        }
    }

    pub fn finish() -> Self {
        Self {
            method: REQUEST_FINISH.to_string(),
            ..Self::start()
        }
    }
}

/// Why a configuration request was refused. A rejection leaves the persisted
/// state untouched; the operator may correct the request and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigRejection {
    #[error("job is not awaiting configuration (phase is {phase})")]
    NotAwaitingConfiguration { phase: String },

    #[error("job state is missing the classifier feature count")]
    MissingFeatureCount,

    #[error("no selection method configured")]
    MissingSelection,

    #[error("no replacement method configured")]
    MissingReplacement,

    #[error("no mutation methods configured")]
    MissingMutation,

    #[error("no crossover methods configured")]
    MissingCrossover,

    #[error("no stop criteria configured")]
    MissingStopCriteria,

    #[error("a run must complete before the job can finish")]
    NoCompletedRun,
}

/// Apply one operator request to the persisted state.
///
/// `start` validates and installs the operator bundle and advances to
/// `Running`; the engine itself is not started until the next step runs the
/// phase. `finish` advances to `Finalizing`. Anything else is logged and
/// ignored.
pub fn apply_request(
    state: &JobState,
    request: &ConfigurationRequest,
) -> Result<JobState, ConfigRejection> {
    match request.method.as_str() {
        REQUEST_START => apply_start(state, request),
        REQUEST_FINISH => apply_finish(state),
        other => {
            warn!("Ignoring unknown request method: {other}");
            Ok(state.clone())
        }
    }
}

fn apply_start(
    state: &JobState,
    request: &ConfigurationRequest,
) -> Result<JobState, ConfigRejection> {
    if state.phase != JobPhase::AwaitingConfiguration {
        return Err(ConfigRejection::NotAwaitingConfiguration {
            phase: state.phase.to_string(),
        });
    }
    let num_features = state
        .num_features
        .ok_or(ConfigRejection::MissingFeatureCount)?;

    let selection = SelectionSettings::from_request(&request.selection);
    let replacement = ReplacementSettings::from_request(&request.replacement);
    let mutation = MutationSettings::from_request(&request.mutation, num_features);
    let crossover = CrossoverSettings::from_request(&request.crossover, num_features);
    let stop_criteria = StopCriteriaSettings::from_request(&request.stop_criteria);

    let skipped = selection.skipped
        + replacement.skipped
        + mutation.skipped
        + crossover.skipped
        + stop_criteria.skipped;
    if skipped > 0 {
        debug!("Request contained {skipped} unusable operator entries");
    }

    if selection.value.method().is_none() {
        return Err(ConfigRejection::MissingSelection);
    }
    if replacement.value.method().is_none() {
        return Err(ConfigRejection::MissingReplacement);
    }
    if mutation.value.is_empty() {
        return Err(ConfigRejection::MissingMutation);
    }
    if crossover.value.is_empty() {
        return Err(ConfigRejection::MissingCrossover);
    }
    if stop_criteria.value.is_empty() {
        return Err(ConfigRejection::MissingStopCriteria);
    }

    let bundle = OperatorBundle {
        selection: selection.value,
        replacement: replacement.value,
        mutation: mutation.value,
        crossover: crossover.value,
        stop_criteria: stop_criteria.value,
    };

    let mut next = state.clone();
    next.operators = Some(bundle.serialize());
    if let Some(base) = &request.base {
        next.base = Some(base.clone());
    }
    next.phase = JobPhase::Running;
    Ok(next)
}

fn apply_finish(state: &JobState) -> Result<JobState, ConfigRejection> {
    if state.phase != JobPhase::AwaitingConfiguration {
        return Err(ConfigRejection::NotAwaitingConfiguration {
            phase: state.phase.to_string(),
        });
    }
    if state.run_summary.is_none() {
        return Err(ConfigRejection::NoCompletedRun);
    }

    let mut next = state.clone();
    next.phase = JobPhase::Finalizing;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunSummary;
    use et_operators::SerializedBundle;
    use serde_json::json;

    fn awaiting_state() -> JobState {
        JobState {
            phase: JobPhase::AwaitingConfiguration,
            operators: Some(SerializedBundle::empty()),
            base: Some(BaseSettings::default()),
            classifier_state: Some(r#"{"k":1,"weights":[1.0,1.0],"selections":[true,true]}"#.into()),
            num_features: Some(2),
            run_summary: None,
        }
    }

    fn complete_start_request() -> ConfigurationRequest {
        serde_json::from_value(json!({
            "method": "start",
            "selection": {"method": "tournament", "parameters": {"tSize": 3}},
            "replacement": {"method": "generational", "parameters": {}},
            "mutation": [
                {"method": "gauss", "parameters": {"min": 0.0, "max": 1.0, "sigma": 0.5, "rate": 1.0}}
            ],
            "crossover": [{"method": "uniform", "parameters": {"preference": 0.5}}],
            "stop_criteria": [{"method": "maxGenerations", "parameters": {"n": 20}}]
        }))
        .unwrap()
    }

    #[test]
    fn valid_start_advances_to_running() {
        let state = awaiting_state();
        let next = apply_request(&state, &complete_start_request()).unwrap();

        assert_eq!(next.phase, JobPhase::Running);
        let operators = next.operators.unwrap();
        assert_eq!(
            operators.selection.method.as_deref(),
            Some("tournament")
        );
        // The gauss entry was sized from the job's feature count.
        assert_eq!(
            operators.mutation[0].parameters["numberFeatures"],
            json!(2)
        );
    }

    #[test]
    fn start_without_stop_criteria_is_rejected() {
        let state = awaiting_state();
        let mut request = complete_start_request();
        request.stop_criteria.clear();

        let rejection = apply_request(&state, &request).unwrap_err();
        assert_eq!(rejection, ConfigRejection::MissingStopCriteria);
        // The caller's state is untouched.
        assert_eq!(state.phase, JobPhase::AwaitingConfiguration);
        assert_eq!(state.operators, Some(SerializedBundle::empty()));
    }

    #[test]
    fn each_missing_family_has_a_named_rejection() {
        let state = awaiting_state();

        let mut request = complete_start_request();
        request.selection = SingleMethodForm::empty();
        assert_eq!(
            apply_request(&state, &request).unwrap_err(),
            ConfigRejection::MissingSelection
        );

        let mut request = complete_start_request();
        request.replacement = SingleMethodForm::empty();
        assert_eq!(
            apply_request(&state, &request).unwrap_err(),
            ConfigRejection::MissingReplacement
        );

        let mut request = complete_start_request();
        request.mutation.clear();
        assert_eq!(
            apply_request(&state, &request).unwrap_err(),
            ConfigRejection::MissingMutation
        );

        let mut request = complete_start_request();
        request.crossover.clear();
        assert_eq!(
            apply_request(&state, &request).unwrap_err(),
            ConfigRejection::MissingCrossover
        );
    }

    #[test]
    fn unknown_selection_method_surfaces_as_missing_selection() {
        let state = awaiting_state();
        let mut request = complete_start_request();
        request.selection = serde_json::from_value(json!({
            "method": "hill_climbing", "parameters": {}
        }))
        .unwrap();

        assert_eq!(
            apply_request(&state, &request).unwrap_err(),
            ConfigRejection::MissingSelection
        );
    }

    #[test]
    fn start_outside_awaiting_phase_is_rejected() {
        let mut state = awaiting_state();
        state.phase = JobPhase::Running;

        let rejection = apply_request(&state, &complete_start_request()).unwrap_err();
        assert!(matches!(
            rejection,
            ConfigRejection::NotAwaitingConfiguration { .. }
        ));
    }

    #[test]
    fn finish_before_any_run_is_rejected() {
        let state = awaiting_state();
        let rejection = apply_request(&state, &ConfigurationRequest::finish()).unwrap_err();
        assert_eq!(rejection, ConfigRejection::NoCompletedRun);
    }

    #[test]
    fn finish_after_a_run_advances_to_finalizing() {
        let mut state = awaiting_state();
        state.run_summary = Some(RunSummary {
            generation_count: 15,
            best_fitness: 0.8,
        });

        let next = apply_request(&state, &ConfigurationRequest::finish()).unwrap();
        assert_eq!(next.phase, JobPhase::Finalizing);
        assert_eq!(next.run_summary, state.run_summary);
    }

    #[test]
    fn unknown_request_method_changes_nothing() {
        let state = awaiting_state();
        let mut request = ConfigurationRequest::start();
        request.method = "pause".to_string();

        let next = apply_request(&state, &request).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn request_base_settings_are_installed() {
        let state = awaiting_state();
        let mut request = complete_start_request();
        request.base = Some(BaseSettings::default().with_population_size(24));

        let next = apply_request(&state, &request).unwrap();
        assert_eq!(next.base.unwrap().population_size, 24);
    }
}
