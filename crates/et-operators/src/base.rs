//! Global algorithm settings: what the optimizer evolves and the coarse GA
//! rates that apply across whatever operator methods are active.

use serde::{Deserialize, Serialize};

pub const DEFAULT_POPULATION_SIZE: u32 = 75;
pub const DEFAULT_CROSSOVER_RATE: f64 = 0.95;
pub const DEFAULT_MUTATION_RATE: f64 = 0.05;

/// Whether the run evolves per-feature weights or per-feature selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    Weighting,
    Selection,
}

impl Default for OptimizationMode {
    fn default() -> Self {
        Self::Weighting
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSettings {
    #[serde(default)]
    pub mode: OptimizationMode,
    #[serde(default = "default_population_size")]
    pub population_size: u32,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

fn default_population_size() -> u32 {
    DEFAULT_POPULATION_SIZE
}

fn default_crossover_rate() -> f64 {
    DEFAULT_CROSSOVER_RATE
}

fn default_mutation_rate() -> f64 {
    DEFAULT_MUTATION_RATE
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            mode: OptimizationMode::default(),
            population_size: DEFAULT_POPULATION_SIZE,
            crossover_rate: DEFAULT_CROSSOVER_RATE,
            mutation_rate: DEFAULT_MUTATION_RATE,
        }
    }
}

impl BaseSettings {
    pub fn with_mode(mut self, mode: OptimizationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_population_size(mut self, n: u32) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }
}
