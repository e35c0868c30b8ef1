//! Stopping-rule settings.
//!
//! Several rules may be active at once; the run stops as soon as any one of
//! them fires.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{f64_param, u64_param, Decoded, MethodEntry};
use crate::method_set::{MethodKey, MethodSet};

pub const DEFAULT_BEST_FITNESS_OPTIMUM: f64 = 1.0;
pub const DEFAULT_MAX_FITNESS_EVALS: u64 = 5000;
pub const DEFAULT_MAX_GENERATIONS: u64 = 100;
pub const DEFAULT_STEADY_STATE_MIN_GENS: u64 = 40;
pub const DEFAULT_STEADY_STATE_NO_CHANGE_GENS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum StopCriterion {
    /// Stop once the best fitness reaches the optimum.
    BestFitness { optimum: f64 },
    MaxFitnessEvals { n: u64 },
    MaxGenerations { n: u64 },
    /// Stop after `min_gens` generations once the best fitness has not
    /// improved for `no_change_gens` generations.
    SteadyState { min_gens: u64, no_change_gens: u64 },
}

impl MethodKey for StopCriterion {
    fn key(&self) -> &'static str {
        match self {
            Self::BestFitness { .. } => "bestFitness",
            Self::MaxFitnessEvals { .. } => "maxFitnessEvals",
            Self::MaxGenerations { .. } => "maxGenerations",
            Self::SteadyState { .. } => "steadyState",
        }
    }
}

impl StopCriterion {
    fn parameters(&self) -> Map<String, Value> {
        let mut p = Map::new();
        match self {
            Self::BestFitness { optimum } => {
                p.insert("optimum".into(), Value::from(*optimum));
            }
            Self::MaxFitnessEvals { n } | Self::MaxGenerations { n } => {
                p.insert("n".into(), Value::from(*n));
            }
            Self::SteadyState {
                min_gens,
                no_change_gens,
            } => {
                p.insert("minGens".into(), Value::from(*min_gens));
                p.insert("noChangeGens".into(), Value::from(*no_change_gens));
            }
        }
        p
    }

    fn decode(name: &str, p: &Map<String, Value>) -> Option<Self> {
        match name {
            "bestFitness" => Some(Self::BestFitness {
                optimum: f64_param(p, "optimum", DEFAULT_BEST_FITNESS_OPTIMUM),
            }),
            "maxFitnessEvals" => Some(Self::MaxFitnessEvals {
                n: u64_param(p, "n", DEFAULT_MAX_FITNESS_EVALS),
            }),
            "maxGenerations" => Some(Self::MaxGenerations {
                n: u64_param(p, "n", DEFAULT_MAX_GENERATIONS),
            }),
            "steadyState" => Some(Self::SteadyState {
                min_gens: u64_param(p, "minGens", DEFAULT_STEADY_STATE_MIN_GENS),
                no_change_gens: u64_param(
                    p,
                    "noChangeGens",
                    DEFAULT_STEADY_STATE_NO_CHANGE_GENS,
                ),
            }),
            _ => None,
        }
    }
}

/// Stop-criteria settings: an ordered set of simultaneously active rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopCriteriaSettings {
    methods: MethodSet<StopCriterion>,
}

impl StopCriteriaSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_best_fitness(&mut self, optimum: f64) {
        self.methods.upsert(StopCriterion::BestFitness { optimum });
    }

    pub fn set_max_fitness_evals(&mut self, n: u64) {
        self.methods.upsert(StopCriterion::MaxFitnessEvals { n });
    }

    pub fn set_max_generations(&mut self, n: u64) {
        self.methods.upsert(StopCriterion::MaxGenerations { n });
    }

    pub fn set_steady_state(&mut self, min_gens: u64, no_change_gens: u64) {
        self.methods.upsert(StopCriterion::SteadyState {
            min_gens,
            no_change_gens,
        });
    }

    pub fn criteria(&self) -> &[StopCriterion] {
        self.methods.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn serialize(&self) -> Vec<MethodEntry> {
        self.methods
            .iter()
            .map(|m| MethodEntry {
                method: m.key().to_string(),
                parameters: m.parameters(),
            })
            .collect()
    }

    pub fn from_serialized(entries: &[MethodEntry]) -> Decoded<Self> {
        let mut settings = Self::new();
        let mut skipped = 0;
        for entry in entries {
            match StopCriterion::decode(&entry.method, &entry.parameters) {
                Some(method) => settings.methods.upsert(method),
                None => {
                    warn!("Skipping unknown stop criterion: {}", entry.method);
                    skipped += 1;
                }
            }
        }
        Decoded {
            value: settings,
            skipped,
        }
    }

    /// Stop criteria carry no feature-sized parameters; request replay is
    /// identical to durable-form replay.
    pub fn from_request(entries: &[MethodEntry]) -> Decoded<Self> {
        Self::from_serialized(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distinct_criteria_combine_in_order() {
        let mut sc = StopCriteriaSettings::new();
        sc.set_max_generations(20);
        sc.set_max_fitness_evals(DEFAULT_MAX_FITNESS_EVALS);

        assert_eq!(
            serde_json::to_value(sc.serialize()).unwrap(),
            json!([
                {"method": "maxGenerations", "parameters": {"n": 20}},
                {"method": "maxFitnessEvals", "parameters": {"n": 5000}}
            ])
        );
    }

    #[test]
    fn same_criterion_overwrites_in_place() {
        let mut sc = StopCriteriaSettings::new();
        sc.set_max_generations(100);
        sc.set_max_generations(150);

        assert_eq!(sc.criteria().len(), 1);
        assert_eq!(sc.criteria(), &[StopCriterion::MaxGenerations { n: 150 }]);
    }

    #[test]
    fn round_trip_is_fixed_point() {
        let mut sc = StopCriteriaSettings::new();
        sc.set_best_fitness(0.98);
        sc.set_steady_state(50, 15);

        let encoded = sc.serialize();
        let decoded = StopCriteriaSettings::from_serialized(&encoded);
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.value.serialize(), encoded);
    }

    #[test]
    fn missing_parameters_fall_back_to_defaults() {
        let entries: Vec<MethodEntry> =
            serde_json::from_value(json!([{"method": "steadyState", "parameters": {}}])).unwrap();
        let decoded = StopCriteriaSettings::from_serialized(&entries);
        assert_eq!(
            decoded.value.criteria(),
            &[StopCriterion::SteadyState {
                min_gens: DEFAULT_STEADY_STATE_MIN_GENS,
                no_change_gens: DEFAULT_STEADY_STATE_NO_CHANGE_GENS
            }]
        );
    }
}
