//! The phase state machine driving one tuning job.
//!
//! The host invokes [`TuningJob::run_step`] once per scheduling step with
//! the persisted [`JobState`]; the job performs exactly one phase's work and
//! returns either an updated state to persist (suspension) or a terminal
//! outcome. Operator requests go through [`TuningJob::apply_request`]
//! between steps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use et_engine::{EngineHandle, OptimizationSpec, OptimizerEngine, Parallelization};
use et_operators::{BaseSettings, OperatorBundle, SerializedBundle};
use et_types::{ClassifierState, JobError, TrainingSet, TuneResult};

use crate::request::{apply_request, ConfigRejection, ConfigurationRequest};
use crate::state::{JobPhase, JobState, RunSummary};

/// Tunables the host may adjust per deployment.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// How often the running phase polls the engine.
    pub poll_interval: Duration,
    /// Worker degree handed to the engine at start time.
    pub parallelism: Parallelization,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            parallelism: Parallelization::default(),
        }
    }
}

/// The resources the host wired to this job.
#[derive(Debug, Clone)]
pub struct JobResources {
    /// Training-data resource, consumed read-only.
    pub input: PathBuf,
    /// Where the tuned classifier state is written at finalization.
    pub output: PathBuf,
}

/// Read-side presentation of the current configuration for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceView {
    pub base: BaseSettings,
    pub operators: SerializedBundle,
    pub results: Option<RunSummary>,
}

impl InterfaceView {
    pub fn from_state(state: &JobState) -> TuneResult<Self> {
        let operators = state
            .operators
            .clone()
            .ok_or_else(|| JobError::MissingBundle {
                phase: state.phase.to_string(),
            })?;
        Ok(Self {
            base: state.base.clone().unwrap_or_default(),
            operators,
            results: state.run_summary.clone(),
        })
    }
}

/// What a single invocation produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// The job suspended awaiting operator input. Persist `state` and show
    /// `view`.
    AwaitingInput {
        state: JobState,
        view: InterfaceView,
    },
    /// Finalization wrote the output resource; the job is done.
    Completed,
    /// The engine refused to start the configured run. Terminal for this
    /// job; nothing was committed.
    Failed { reason: String },
}

enum Wait {
    Elapsed,
    Cancelled,
    Detached,
}

/// One classifier-tuning job bound to an optimization engine.
pub struct TuningJob {
    engine: Arc<dyn OptimizerEngine>,
    config: JobConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl TuningJob {
    pub fn new(engine: Arc<dyn OptimizerEngine>) -> Self {
        Self {
            engine,
            config: JobConfig::default(),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe a host shutdown signal while waiting on the engine. When the
    /// signal flips to `true` the running phase aborts with
    /// [`JobError::Cancelled`] before committing anything, leaving the phase
    /// restartable.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate an operator request against the current state. See
    /// [`apply_request`].
    pub fn apply_request(
        &self,
        state: &JobState,
        request: &ConfigurationRequest,
    ) -> Result<JobState, ConfigRejection> {
        apply_request(state, request)
    }

    /// Execute one phase's work.
    pub async fn run_step(
        &self,
        state: JobState,
        resources: &JobResources,
    ) -> TuneResult<StepOutcome> {
        match state.phase {
            JobPhase::Init => {
                info!("Phase: init");
                let state = self.initialize(state, resources)?;
                self.await_configuration(state)
            }
            JobPhase::AwaitingConfiguration => {
                info!("Phase: awaiting configuration");
                self.await_configuration(state)
            }
            JobPhase::Running => {
                info!("Phase: running");
                self.run_optimization(state, resources).await
            }
            JobPhase::Finalizing => {
                info!("Phase: finalizing");
                self.finalize(state, resources)
            }
        }
    }

    fn initialize(&self, mut state: JobState, resources: &JobResources) -> TuneResult<JobState> {
        let training = TrainingSet::load(&resources.input)?;
        info!(
            "Loaded training set: {} samples, {} features",
            training.samples.len(),
            training.num_features()
        );

        let classifier = ClassifierState::uniform(training.num_features());
        state.num_features = Some(training.num_features());
        state.classifier_state = Some(classifier.to_blob()?);
        state.operators = Some(SerializedBundle::empty());
        state.base = Some(BaseSettings::default());
        state.phase = JobPhase::AwaitingConfiguration;
        Ok(state)
    }

    /// Re-entrant by design: presenting the configuration mutates nothing.
    fn await_configuration(&self, state: JobState) -> TuneResult<StepOutcome> {
        let view = InterfaceView::from_state(&state)?;
        Ok(StepOutcome::AwaitingInput { state, view })
    }

    async fn run_optimization(
        &self,
        mut state: JobState,
        resources: &JobResources,
    ) -> TuneResult<StepOutcome> {
        // Rebuild everything from persisted data; no in-process object
        // survives between invocations.
        let training = TrainingSet::load(&resources.input)?;
        let blob = state
            .classifier_state
            .as_deref()
            .ok_or_else(|| JobError::MissingClassifierState {
                phase: state.phase.to_string(),
            })?;
        let classifier = ClassifierState::from_blob(blob)?;
        let encoded = state
            .operators
            .as_ref()
            .ok_or_else(|| JobError::MissingBundle {
                phase: state.phase.to_string(),
            })?;
        let decoded = OperatorBundle::from_serialized(encoded);
        if decoded.skipped > 0 {
            warn!(
                "Ignored {} unusable operator entries from persisted state",
                decoded.skipped
            );
        }

        let spec = OptimizationSpec {
            training,
            state: classifier,
            base: state.base.clone().unwrap_or_default(),
            operators: decoded.value,
            parallelism: self.config.parallelism,
        };
        let handle = match self.engine.start(spec) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start optimization: {e}");
                return Ok(StepOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };
        info!("Optimization run {handle} started");

        self.wait_for_engine(&handle).await?;
        let outcome = self
            .engine
            .take_result(&handle)?
            .ok_or(JobError::ResultUnavailable)?;
        info!(
            "Optimization finished: {}",
            outcome.summary.monitor_line()
        );

        state.classifier_state = Some(outcome.state.to_blob()?);
        state.run_summary = Some(RunSummary {
            generation_count: outcome.summary.generation,
            best_fitness: outcome.summary.best_fitness,
        });
        state.phase = JobPhase::AwaitingConfiguration;
        self.await_configuration(state)
    }

    async fn wait_for_engine(&self, handle: &EngineHandle) -> TuneResult<()> {
        let mut shutdown = self.shutdown.clone();
        loop {
            let status = self.engine.status(handle)?;
            if !status.running {
                return Ok(());
            }
            info!("{}", status.monitor_line());

            match self.sleep_or_cancel(&mut shutdown).await {
                Wait::Elapsed => {}
                Wait::Cancelled => return Err(JobError::Cancelled.into()),
                Wait::Detached => shutdown = None,
            }
        }
    }

    async fn sleep_or_cancel(&self, shutdown: &mut Option<watch::Receiver<bool>>) -> Wait {
        let interval = self.config.poll_interval;
        match shutdown {
            None => {
                tokio::time::sleep(interval).await;
                Wait::Elapsed
            }
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => Wait::Elapsed,
                    changed = rx.changed() => match changed {
                        Ok(()) if *rx.borrow() => Wait::Cancelled,
                        Ok(()) => Wait::Elapsed,
                        // Sender gone: stop watching, keep polling.
                        Err(_) => Wait::Detached,
                    },
                }
            }
        }
    }

    fn finalize(&self, state: JobState, resources: &JobResources) -> TuneResult<StepOutcome> {
        let blob = state
            .classifier_state
            .as_deref()
            .ok_or_else(|| JobError::MissingClassifierState {
                phase: state.phase.to_string(),
            })?;
        std::fs::write(&resources.output, blob)?;
        info!(
            "Wrote tuned classifier to {}",
            resources.output.display()
        );
        Ok(StepOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use et_engine::{EngineOutcome, EngineStatus};
    use et_types::{EngineError, Sample};
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;
    use uuid::Uuid;

    // Engine double: one poll of "running", then a fixed tuned state.
    struct MockEngine {
        fail_start: bool,
        hang: bool,
        polls_before_done: u32,
        tuned: ClassifierState,
        state: Mutex<Option<(EngineHandle, u32)>>,
    }

    impl MockEngine {
        fn new() -> Self {
            Self {
                fail_start: false,
                hang: false,
                polls_before_done: 1,
                tuned: ClassifierState {
                    k: 1,
                    weights: vec![0.9, 0.1],
                    selections: vec![true, true],
                },
                state: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                fail_start: true,
                ..Self::new()
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new()
            }
        }
    }

    impl OptimizerEngine for MockEngine {
        fn start(&self, _spec: OptimizationSpec) -> Result<EngineHandle, EngineError> {
            if self.fail_start {
                return Err(EngineError::InvalidConfig {
                    message: "rejected by test engine".into(),
                });
            }
            let handle = EngineHandle { id: Uuid::new_v4() };
            *self.state.lock().unwrap() = Some((handle, self.polls_before_done));
            Ok(handle)
        }

        fn status(&self, handle: &EngineHandle) -> Result<EngineStatus, EngineError> {
            let mut guard = self.state.lock().unwrap();
            let (stored, remaining) = guard.as_mut().ok_or_else(|| EngineError::UnknownRun {
                id: handle.id.to_string(),
            })?;
            assert_eq!(stored.id, handle.id);

            let mut status = EngineStatus::started_now();
            status.generation = 12;
            status.best_fitness = 0.875;
            if self.hang {
                return Ok(status);
            }
            if *remaining == 0 {
                status.running = false;
            } else {
                *remaining -= 1;
            }
            Ok(status)
        }

        fn take_result(&self, handle: &EngineHandle) -> Result<Option<EngineOutcome>, EngineError> {
            let mut summary = self.status(handle)?;
            if summary.running {
                return Ok(None);
            }
            summary.finished_at = Some(summary.started_at);
            Ok(Some(EngineOutcome {
                state: self.tuned.clone(),
                summary,
            }))
        }
    }

    fn write_training_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let training = TrainingSet {
            feature_names: vec!["signal".into(), "noise".into()],
            samples: vec![
                Sample { label: "a".into(), features: vec![0.1, 0.9] },
                Sample { label: "a".into(), features: vec![0.2, 0.3] },
                Sample { label: "b".into(), features: vec![0.8, 0.7] },
                Sample { label: "b".into(), features: vec![0.9, 0.2] },
            ],
        };
        file.write_all(serde_json::to_string(&training).unwrap().as_bytes())
            .unwrap();
        file
    }

    fn test_job(engine: MockEngine) -> TuningJob {
        TuningJob::new(Arc::new(engine)).with_config(JobConfig {
            poll_interval: Duration::from_millis(5),
            parallelism: Parallelization::new(false, 1),
        })
    }

    fn start_request() -> ConfigurationRequest {
        serde_json::from_value(json!({
            "method": "start",
            "selection": {"method": "rank", "parameters": {"pressure": 1.5, "exponent": 1.0}},
            "replacement": {"method": "SSGAworse", "parameters": {}},
            "mutation": [{"method": "inversion", "parameters": {}}],
            "crossover": [{"method": "nPoint", "parameters": {"n": 2}}],
            "stop_criteria": [{"method": "maxGenerations", "parameters": {"n": 12}}]
        }))
        .unwrap()
    }

    fn unwrap_awaiting(outcome: StepOutcome) -> (JobState, InterfaceView) {
        match outcome {
            StepOutcome::AwaitingInput { state, view } => (state, view),
            other => panic!("expected AwaitingInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn init_falls_through_to_awaiting_configuration() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let job = test_job(MockEngine::new());
        let outcome = job.run_step(JobState::new(), &resources).await.unwrap();
        let (state, view) = unwrap_awaiting(outcome);

        assert_eq!(state.phase, JobPhase::AwaitingConfiguration);
        assert_eq!(state.num_features, Some(2));
        assert!(state.classifier_state.is_some());
        assert_eq!(state.operators, Some(SerializedBundle::empty()));
        assert!(state.run_summary.is_none());
        assert!(view.results.is_none());
    }

    #[tokio::test]
    async fn awaiting_step_is_idempotent() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let job = test_job(MockEngine::new());
        let (state, _) = unwrap_awaiting(job.run_step(JobState::new(), &resources).await.unwrap());
        let (again, _) = unwrap_awaiting(job.run_step(state.clone(), &resources).await.unwrap());
        assert_eq!(state, again);
    }

    #[tokio::test]
    async fn full_cycle_returns_to_awaiting_with_summary() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let job = test_job(MockEngine::new());
        let (state, _) = unwrap_awaiting(job.run_step(JobState::new(), &resources).await.unwrap());

        // Host persists the state between invocations; simulate that.
        let state = JobState::from_json(&state.to_json().unwrap()).unwrap();
        let state = job.apply_request(&state, &start_request()).unwrap();
        assert_eq!(state.phase, JobPhase::Running);
        let bundle_before = state.operators.clone();

        let state = JobState::from_json(&state.to_json().unwrap()).unwrap();
        let (state, view) = unwrap_awaiting(job.run_step(state, &resources).await.unwrap());

        assert_eq!(state.phase, JobPhase::AwaitingConfiguration);
        assert_eq!(state.operators, bundle_before);
        let summary = state.run_summary.clone().unwrap();
        assert_eq!(summary.generation_count, 12);
        assert_eq!(summary.best_fitness, 0.875);
        assert_eq!(view.results, state.run_summary);

        // The tuned classifier replaced the persisted blob.
        let tuned = ClassifierState::from_blob(state.classifier_state.as_deref().unwrap()).unwrap();
        assert_eq!(tuned.weights, vec![0.9, 0.1]);
    }

    #[tokio::test]
    async fn engine_start_failure_is_a_job_failure() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let job = test_job(MockEngine::failing());
        let (state, _) = unwrap_awaiting(job.run_step(JobState::new(), &resources).await.unwrap());
        let state = job.apply_request(&state, &start_request()).unwrap();

        match job.run_step(state, &resources).await.unwrap() {
            StepOutcome::Failed { reason } => assert!(reason.contains("rejected")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finalizing_writes_the_persisted_blob() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let job = test_job(MockEngine::new());
        let (state, _) = unwrap_awaiting(job.run_step(JobState::new(), &resources).await.unwrap());
        let mut state = state;
        state.run_summary = Some(RunSummary {
            generation_count: 3,
            best_fitness: 0.5,
        });
        let state = job
            .apply_request(&state, &ConfigurationRequest::finish())
            .unwrap();
        assert_eq!(state.phase, JobPhase::Finalizing);

        let blob = state.classifier_state.clone().unwrap();
        match job.run_step(state, &resources).await.unwrap() {
            StepOutcome::Completed => {}
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(output.path()).unwrap(), blob);
    }

    #[tokio::test]
    async fn shutdown_signal_cancels_the_running_wait() {
        let input = write_training_file();
        let output = tempfile::NamedTempFile::new().unwrap();
        let resources = JobResources {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
        };

        let (tx, rx) = watch::channel(false);
        let job = test_job(MockEngine::hanging()).with_shutdown(rx);
        let (state, _) = unwrap_awaiting(job.run_step(JobState::new(), &resources).await.unwrap());
        let state = job.apply_request(&state, &start_request()).unwrap();
        let blob_before = state.classifier_state.clone();

        tx.send(true).unwrap();
        let err = job.run_step(state.clone(), &resources).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        // Nothing was committed; the phase re-runs from the same state.
        assert_eq!(state.classifier_state, blob_before);
        assert!(state.run_summary.is_none());
    }

    #[tokio::test]
    async fn missing_input_resource_is_fatal() {
        let resources = JobResources {
            input: PathBuf::from("/nonexistent/training.json"),
            output: PathBuf::from("/nonexistent/out.json"),
        };

        let job = test_job(MockEngine::new());
        assert!(job.run_step(JobState::new(), &resources).await.is_err());
    }
}
