//! The capability interface between the tuning job and an optimization
//! engine.
//!
//! The job only ever sees this surface: start a run with a fully resolved
//! configuration, poll its status, collect the outcome. Engines perform no
//! retries; retry policy belongs to the job's host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use et_operators::{BaseSettings, OperatorBundle};
use et_types::{ClassifierState, EngineError, TrainingSet};

/// Worker-pool degree handed to the engine at start time. The engine's
/// internal parallelism is otherwise opaque to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parallelization {
    pub enabled: bool,
    pub workers: usize,
}

impl Parallelization {
    pub fn new(enabled: bool, workers: usize) -> Self {
        Self {
            enabled,
            workers: workers.max(1),
        }
    }
}

impl Default for Parallelization {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 4,
        }
    }
}

/// Everything an engine needs to run one optimization.
#[derive(Debug, Clone)]
pub struct OptimizationSpec {
    pub training: TrainingSet,
    pub state: ClassifierState,
    pub base: BaseSettings,
    pub operators: OperatorBundle,
    pub parallelism: Parallelization,
}

/// Opaque reference to a started run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineHandle {
    pub id: Uuid,
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Snapshot of a run's progress. Safe to request repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub generation: u64,
    pub best_fitness: f64,
    pub evaluations: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EngineStatus {
    pub fn started_now() -> Self {
        Self {
            running: true,
            generation: 0,
            best_fitness: 0.0,
            evaluations: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// One-line progress summary for operator-facing logs.
    pub fn monitor_line(&self) -> String {
        format!(
            "generation {}, best fitness {:.4}",
            self.generation, self.best_fitness
        )
    }
}

/// Final product of a completed run.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub state: ClassifierState,
    pub summary: EngineStatus,
}

/// Per-generation progress notification, emitted on the engine's optional
/// progress channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub generation: u64,
    pub best_fitness: f64,
}

/// Capability interface over an optimization engine.
pub trait OptimizerEngine: Send + Sync {
    /// Start one run. Fails if the engine rejects the configuration, e.g.
    /// operator dimensionality that disagrees with the classifier.
    fn start(&self, spec: OptimizationSpec) -> Result<EngineHandle, EngineError>;

    /// Non-blocking status poll.
    fn status(&self, handle: &EngineHandle) -> Result<EngineStatus, EngineError>;

    /// Collect the outcome of a finished run. Returns `None` while the run
    /// is still in progress; a finished run yields its outcome exactly once.
    fn take_result(&self, handle: &EngineHandle) -> Result<Option<EngineOutcome>, EngineError>;
}
