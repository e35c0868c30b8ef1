//! # et-engine
//!
//! The optimization-engine boundary of EvoTune: the [`OptimizerEngine`]
//! capability trait the tuning job programs against, plus [`GaEngine`], an
//! in-process genetic-algorithm implementation of it.

mod engine;
mod fitness;
mod ga;

pub use engine::{
    EngineHandle, EngineOutcome, EngineStatus, OptimizationSpec, OptimizerEngine, Parallelization,
    ProgressEvent,
};
pub use fitness::loo_accuracy;
pub use ga::GaEngine;
