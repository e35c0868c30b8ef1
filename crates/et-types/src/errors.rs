use thiserror::Error;

/// Main error type for the EvoTune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classifier and training-resource errors
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Training resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("Invalid training data: {message}")]
    InvalidFormat { message: String },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Inconsistent feature vector: sample {index} has {actual} features, expected {expected}")]
    InconsistentSample {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Classifier state has {actual} features, classifier expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid classifier state: {message}")]
    InvalidState { message: String },
}

/// Optimization engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine rejected configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Operator sized for {operator_features} features, classifier has {classifier_features}")]
    DimensionMismatch {
        operator_features: usize,
        classifier_features: usize,
    },

    #[error("Unknown optimization run: {id}")]
    UnknownRun { id: String },

    #[error("Optimization run {id} is still in progress")]
    StillRunning { id: String },

    #[error("Engine worker failed: {message}")]
    WorkerFailed { message: String },
}

/// Job lifecycle errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("No classifier state available in phase {phase}")]
    MissingClassifierState { phase: String },

    #[error("No operator bundle available in phase {phase}")]
    MissingBundle { phase: String },

    #[error("Feature count is not recorded in the job state")]
    MissingFeatureCount,

    #[error("Job step cancelled by host")]
    Cancelled,

    #[error("Engine reported completion but produced no result")]
    ResultUnavailable,
}

/// Result type alias for EvoTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}
