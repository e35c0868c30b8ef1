//! # et-job
//!
//! The interactive classifier-tuning job: a phase state machine that is
//! driven one step per host invocation, persists everything mutable as
//! serialized data, validates operator configuration requests, and runs the
//! optimization engine through its capability interface.

mod job;
mod request;
mod state;

pub use job::{InterfaceView, JobConfig, JobResources, StepOutcome, TuningJob};
pub use request::{
    apply_request, ConfigRejection, ConfigurationRequest, REQUEST_FINISH, REQUEST_START,
};
pub use state::{JobPhase, JobState, RunSummary};
