//! # et-operators
//!
//! Typed, round-trippable configuration model for the genetic optimizer's
//! operator families: selection, replacement, mutation, crossover, and
//! stopping rules, plus the global base settings.
//!
//! Every family serializes to a compact method-name+parameters form, decodes
//! back by replaying entries through its setters (unknown entries are
//! skipped and counted), and can also be built from an operator-supplied
//! request, where feature-sized parameters come from the classifier rather
//! than the request.

mod base;
mod bundle;
mod crossover;
mod entry;
mod method_set;
mod mutation;
mod replacement;
mod selection;
mod stop;

pub use base::{
    BaseSettings, OptimizationMode, DEFAULT_CROSSOVER_RATE, DEFAULT_MUTATION_RATE,
    DEFAULT_POPULATION_SIZE,
};
pub use bundle::{OperatorBundle, SerializedBundle};
pub use crossover::{CrossoverMethod, CrossoverSettings};
pub use entry::{Decoded, MethodEntry, SingleMethodForm};
pub use method_set::{MethodKey, MethodSet};
pub use mutation::{MutationMethod, MutationSettings};
pub use replacement::{ReplacementMethod, ReplacementSettings};
pub use selection::{SelectionMethod, SelectionSettings};
pub use stop::{StopCriteriaSettings, StopCriterion};
