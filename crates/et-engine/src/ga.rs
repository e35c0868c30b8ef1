//! In-process genetic-algorithm engine.
//!
//! Implements [`OptimizerEngine`] with a worker thread per run: a population
//! of candidate weight/selection genomes evolves under whatever operator
//! methods the bundle activates, with fitness evaluated in parallel on a
//! rayon pool sized from the parallelism degree.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use et_operators::{
    BaseSettings, CrossoverMethod, MutationMethod, OperatorBundle, OptimizationMode,
    ReplacementMethod, SelectionMethod, StopCriterion,
};
use et_types::{ClassifierState, EngineError, TrainingSet};

use crate::engine::{
    EngineHandle, EngineOutcome, EngineStatus, OptimizationSpec, OptimizerEngine, ProgressEvent,
};
use crate::fitness::loo_accuracy;

/// The in-process engine. Cheap to clone behind an `Arc`; each started run
/// lives in the registry until its result is collected.
pub struct GaEngine {
    runs: DashMap<Uuid, Arc<RunSlot>>,
    progress: Option<Sender<ProgressEvent>>,
    seed: Option<u64>,
}

struct RunSlot {
    status: Mutex<EngineStatus>,
    result: Mutex<Option<ClassifierState>>,
}

impl GaEngine {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
            progress: None,
            seed: None,
        }
    }

    /// Emit a [`ProgressEvent`] per generation on the given channel.
    pub fn with_progress(mut self, tx: Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Fixed RNG seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for GaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerEngine for GaEngine {
    fn start(&self, spec: OptimizationSpec) -> Result<EngineHandle, EngineError> {
        validate_spec(&spec)?;

        let id = Uuid::new_v4();
        let slot = Arc::new(RunSlot {
            status: Mutex::new(EngineStatus::started_now()),
            result: Mutex::new(None),
        });
        self.runs.insert(id, Arc::clone(&slot));

        info!(
            "Starting GA run {id}: {} features, population {}, {} worker(s)",
            spec.training.num_features(),
            spec.base.population_size,
            spec.parallelism.workers
        );

        let progress = self.progress.clone();
        let seed = self.seed;
        std::thread::spawn(move || {
            let tuned = Evolution::new(spec, seed).run(|generation, best_fitness, evaluations| {
                {
                    let mut status = slot.status.lock();
                    status.generation = generation;
                    status.best_fitness = best_fitness;
                    status.evaluations = evaluations;
                }
                if let Some(tx) = &progress {
                    let _ = tx.send(ProgressEvent {
                        run_id: id,
                        generation,
                        best_fitness,
                    });
                }
            });

            *slot.result.lock() = Some(tuned);
            let mut status = slot.status.lock();
            status.running = false;
            status.finished_at = Some(Utc::now());
            debug!(
                "GA run {id} finished at generation {} with fitness {:.4}",
                status.generation, status.best_fitness
            );
        });

        Ok(EngineHandle { id })
    }

    fn status(&self, handle: &EngineHandle) -> Result<EngineStatus, EngineError> {
        let slot = self.runs.get(&handle.id).ok_or_else(|| EngineError::UnknownRun {
            id: handle.id.to_string(),
        })?;
        let status = slot.status.lock().clone();
        Ok(status)
    }

    fn take_result(&self, handle: &EngineHandle) -> Result<Option<EngineOutcome>, EngineError> {
        let (summary, result) = {
            let slot = self.runs.get(&handle.id).ok_or_else(|| EngineError::UnknownRun {
                id: handle.id.to_string(),
            })?;
            let status = slot.status.lock().clone();
            if status.running {
                return Ok(None);
            }
            let taken = slot.result.lock().take();
            (status, taken)
        };

        self.runs.remove(&handle.id);
        match result {
            Some(state) => Ok(Some(EngineOutcome {
                state,
                summary,
            })),
            None => Err(EngineError::WorkerFailed {
                message: format!("run {} finished without a result", handle.id),
            }),
        }
    }
}

fn validate_spec(spec: &OptimizationSpec) -> Result<(), EngineError> {
    let dim = spec.training.num_features();
    if dim == 0 {
        return Err(EngineError::InvalidConfig {
            message: "training set has no features".to_string(),
        });
    }
    spec.training
        .validate()
        .and_then(|_| spec.state.check_dimensions(&spec.training))
        .map_err(|e| EngineError::InvalidConfig {
            message: e.to_string(),
        })?;

    let ops = &spec.operators;
    if ops.selection.method().is_none() {
        return Err(EngineError::InvalidConfig {
            message: "no selection method".to_string(),
        });
    }
    if ops.replacement.method().is_none() {
        return Err(EngineError::InvalidConfig {
            message: "no replacement method".to_string(),
        });
    }
    if ops.mutation.is_empty() {
        return Err(EngineError::InvalidConfig {
            message: "no mutation methods".to_string(),
        });
    }
    if ops.crossover.is_empty() {
        return Err(EngineError::InvalidConfig {
            message: "no crossover methods".to_string(),
        });
    }
    if ops.stop_criteria.is_empty() {
        return Err(EngineError::InvalidConfig {
            message: "no stop criteria".to_string(),
        });
    }

    for method in ops.mutation.methods() {
        if let MutationMethod::Gauss {
            number_features, ..
        } = method
        {
            if *number_features != dim {
                return Err(EngineError::DimensionMismatch {
                    operator_features: *number_features,
                    classifier_features: dim,
                });
            }
        }
    }
    for method in ops.crossover.methods() {
        let sized = match method {
            CrossoverMethod::Hypercube { num_features, .. }
            | CrossoverMethod::Sbx { num_features, .. }
            | CrossoverMethod::Segment { num_features, .. } => Some(*num_features),
            _ => None,
        };
        if let Some(num_features) = sized {
            if num_features != dim {
                return Err(EngineError::DimensionMismatch {
                    operator_features: num_features,
                    classifier_features: dim,
                });
            }
        }
    }

    if spec.base.population_size < 2 {
        return Err(EngineError::InvalidConfig {
            message: format!("population size {} is too small", spec.base.population_size),
        });
    }
    for (name, rate) in [
        ("crossover", spec.base.crossover_rate),
        ("mutation", spec.base.mutation_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(EngineError::InvalidConfig {
                message: format!("{name} rate {rate} is outside [0, 1]"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Evolution loop
// ---------------------------------------------------------------------------

struct Evolution {
    training: TrainingSet,
    state: ClassifierState,
    base: BaseSettings,
    operators: OperatorBundle,
    pool: Option<rayon::ThreadPool>,
    rng: ChaCha8Rng,
    dim: usize,
}

impl Evolution {
    fn new(spec: OptimizationSpec, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        let pool = if spec.parallelism.enabled {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(spec.parallelism.workers)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("Falling back to serial fitness evaluation: {e}");
                    None
                }
            }
        } else {
            None
        };
        let dim = spec.training.num_features();

        Self {
            training: spec.training,
            state: spec.state,
            base: spec.base,
            operators: spec.operators,
            pool,
            rng,
            dim,
        }
    }

    fn run(mut self, mut on_generation: impl FnMut(u64, f64, u64)) -> ClassifierState {
        let pop_size = self.base.population_size.max(2) as usize;
        let replacement = self
            .operators
            .replacement
            .method()
            .cloned()
            .unwrap_or(ReplacementMethod::Generational);

        let mut population: Vec<Vec<f64>> = Vec::with_capacity(pop_size);
        population.push(self.encode_current());
        while population.len() < pop_size {
            let genome = self.random_genome();
            population.push(genome);
        }
        let mut fitness = self.evaluate_all(&population);
        let mut evaluations = population.len() as u64;

        let best_idx = argmax(&fitness);
        let mut best_genome = population[best_idx].clone();
        let mut best_fitness = fitness[best_idx];

        let mut generation: u64 = 0;
        let mut stale_gens: u64 = 0;

        while !self.should_stop(generation, best_fitness, evaluations, stale_gens) {
            generation += 1;

            let offspring_count = match replacement {
                ReplacementMethod::Generational => pop_size.saturating_sub(1).max(1),
                _ => 1,
            };
            let mut offspring = Vec::with_capacity(offspring_count);
            for _ in 0..offspring_count {
                let p1 = self.select_parent(&fitness);
                let p2 = self.select_parent(&fitness);
                let roll: f64 = self.rng.gen();
                let mut child = if roll < self.base.crossover_rate {
                    self.crossover(&population[p1], &population[p2])
                } else {
                    population[p1].clone()
                };
                self.mutate(&mut child);
                offspring.push(child);
            }
            let offspring_fitness = self.evaluate_all(&offspring);
            evaluations += offspring.len() as u64;

            match replacement {
                ReplacementMethod::Generational => {
                    // Elitism: the best survivor seeds the next generation.
                    let mut next_pop = Vec::with_capacity(pop_size);
                    let mut next_fit = Vec::with_capacity(pop_size);
                    next_pop.push(best_genome.clone());
                    next_fit.push(best_fitness);
                    next_pop.extend(offspring);
                    next_fit.extend(offspring_fitness);
                    population = next_pop;
                    fitness = next_fit;
                }
                ReplacementMethod::SsgaWorse => {
                    let victim = argmin(&fitness);
                    population[victim] = offspring.remove(0);
                    fitness[victim] = offspring_fitness[0];
                }
                ReplacementMethod::SsgaDetTournament { t_size } => {
                    let victim = self.eviction_tournament(&fitness, t_size);
                    population[victim] = offspring.remove(0);
                    fitness[victim] = offspring_fitness[0];
                }
            }

            let idx = argmax(&fitness);
            if fitness[idx] > best_fitness {
                best_fitness = fitness[idx];
                best_genome = population[idx].clone();
                stale_gens = 0;
            } else {
                stale_gens += 1;
            }

            on_generation(generation, best_fitness, evaluations);
        }

        self.decode(&best_genome)
    }

    fn encode_current(&self) -> Vec<f64> {
        match self.base.mode {
            OptimizationMode::Weighting => self.state.weights.clone(),
            OptimizationMode::Selection => self
                .state
                .selections
                .iter()
                .map(|&s| if s { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    fn random_genome(&mut self) -> Vec<f64> {
        (0..self.dim).map(|_| self.rng.gen()).collect()
    }

    fn decode_params(&self, genome: &[f64]) -> (Vec<f64>, Vec<bool>) {
        match self.base.mode {
            OptimizationMode::Weighting => (
                genome.iter().map(|w| w.clamp(0.0, 1.0)).collect(),
                self.state.selections.clone(),
            ),
            OptimizationMode::Selection => (
                self.state.weights.clone(),
                genome.iter().map(|&v| v > 0.5).collect(),
            ),
        }
    }

    fn decode(&self, genome: &[f64]) -> ClassifierState {
        let (weights, selections) = self.decode_params(genome);
        ClassifierState {
            k: self.state.k,
            weights,
            selections,
        }
    }

    fn evaluate_all(&self, genomes: &[Vec<f64>]) -> Vec<f64> {
        let evaluate = |genome: &Vec<f64>| {
            let (weights, selections) = self.decode_params(genome);
            loo_accuracy(&self.training, self.state.k, &weights, &selections)
        };
        match &self.pool {
            Some(pool) => pool.install(|| genomes.par_iter().map(evaluate).collect()),
            None => genomes.iter().map(evaluate).collect(),
        }
    }

    fn should_stop(
        &self,
        generation: u64,
        best_fitness: f64,
        evaluations: u64,
        stale_gens: u64,
    ) -> bool {
        self.operators.stop_criteria.criteria().iter().any(|c| match c {
            StopCriterion::BestFitness { optimum } => best_fitness >= *optimum,
            StopCriterion::MaxFitnessEvals { n } => evaluations >= *n,
            StopCriterion::MaxGenerations { n } => generation >= *n,
            StopCriterion::SteadyState {
                min_gens,
                no_change_gens,
            } => generation >= *min_gens && stale_gens >= *no_change_gens,
        })
    }

    // ---- parent selection ----

    fn select_parent(&mut self, fitness: &[f64]) -> usize {
        let method = self
            .operators
            .selection
            .method()
            .cloned()
            .unwrap_or(SelectionMethod::Random);

        match method {
            SelectionMethod::Random => self.rng.gen_range(0..fitness.len()),
            SelectionMethod::Tournament { t_size } => {
                let mut best = self.rng.gen_range(0..fitness.len());
                for _ in 1..t_size.max(1) {
                    let candidate = self.rng.gen_range(0..fitness.len());
                    if fitness[candidate] > fitness[best] {
                        best = candidate;
                    }
                }
                best
            }
            SelectionMethod::Roulette | SelectionMethod::StochasticUniversal => {
                self.spin(fitness.to_vec())
            }
            SelectionMethod::RouletteScaled { pressure } => {
                let weights = scaled_weights(fitness, pressure);
                self.spin(weights)
            }
            SelectionMethod::Rank { pressure, exponent } => {
                let weights = rank_weights(fitness, pressure, exponent);
                self.spin(weights)
            }
        }
    }

    fn spin(&mut self, weights: Vec<f64>) -> usize {
        let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
        if total <= 0.0 {
            return self.rng.gen_range(0..weights.len());
        }
        let mut remaining = self.rng.gen_range(0.0..total);
        for (idx, w) in weights.iter().enumerate() {
            if w.is_finite() && *w > 0.0 {
                remaining -= w;
                if remaining <= 0.0 {
                    return idx;
                }
            }
        }
        weights.len() - 1
    }

    fn eviction_tournament(&mut self, fitness: &[f64], t_size: u32) -> usize {
        let mut worst = self.rng.gen_range(0..fitness.len());
        for _ in 1..t_size.max(1) {
            let candidate = self.rng.gen_range(0..fitness.len());
            if fitness[candidate] < fitness[worst] {
                worst = candidate;
            }
        }
        worst
    }

    // ---- variation operators ----

    fn crossover(&mut self, p1: &[f64], p2: &[f64]) -> Vec<f64> {
        let methods = self.operators.crossover.methods().to_vec();
        let method = methods[self.rng.gen_range(0..methods.len())].clone();

        match method {
            CrossoverMethod::Uniform { preference } => (0..self.dim)
                .map(|d| {
                    let roll: f64 = self.rng.gen();
                    if roll < preference {
                        p1[d]
                    } else {
                        p2[d]
                    }
                })
                .collect(),
            CrossoverMethod::NPoint { n } => self.n_point(p1, p2, n),
            CrossoverMethod::Hypercube {
                min, max, alpha, ..
            } => (0..self.dim)
                .map(|d| {
                    let u = self.rng.gen_range(-alpha..=1.0 + alpha);
                    (p1[d] + u * (p2[d] - p1[d])).clamp(min, max)
                })
                .collect(),
            CrossoverMethod::Segment {
                min, max, alpha, ..
            } => {
                let u = self.rng.gen_range(-alpha..=1.0 + alpha);
                (0..self.dim)
                    .map(|d| (p1[d] + u * (p2[d] - p1[d])).clamp(min, max))
                    .collect()
            }
            CrossoverMethod::Sbx { min, max, eta, .. } => (0..self.dim)
                .map(|d| {
                    let u: f64 = self.rng.gen::<f64>().clamp(1e-9, 1.0 - 1e-9);
                    let exp = 1.0 / (eta + 1.0);
                    let beta = if u <= 0.5 {
                        (2.0 * u).powf(exp)
                    } else {
                        (1.0 / (2.0 * (1.0 - u))).powf(exp)
                    };
                    (0.5 * ((1.0 + beta) * p1[d] + (1.0 - beta) * p2[d])).clamp(min, max)
                })
                .collect(),
        }
    }

    fn n_point(&mut self, p1: &[f64], p2: &[f64], n: u32) -> Vec<f64> {
        if self.dim < 2 {
            return p1.to_vec();
        }
        let mut cuts: Vec<usize> = (0..n).map(|_| self.rng.gen_range(1..self.dim)).collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut child = Vec::with_capacity(self.dim);
        let mut from_first = true;
        let mut next_cut = cuts.iter().peekable();
        for d in 0..self.dim {
            if next_cut.peek() == Some(&&d) {
                from_first = !from_first;
                next_cut.next();
            }
            child.push(if from_first { p1[d] } else { p2[d] });
        }
        child
    }

    fn mutate(&mut self, child: &mut [f64]) {
        let methods = self.operators.mutation.methods().to_vec();
        for method in methods {
            let roll: f64 = self.rng.gen();
            if roll >= self.base.mutation_rate {
                continue;
            }
            match method {
                MutationMethod::Binary { rate, normalize } => {
                    for value in child.iter_mut() {
                        let bit_roll: f64 = self.rng.gen();
                        if bit_roll < rate {
                            *value = if *value > 0.5 { 0.0 } else { 1.0 };
                        }
                    }
                    if normalize {
                        normalize_genome(child);
                    }
                }
                MutationMethod::Gauss {
                    min,
                    max,
                    sigma,
                    rate,
                    ..
                } => {
                    for value in child.iter_mut() {
                        let gene_roll: f64 = self.rng.gen();
                        if gene_roll < rate {
                            *value = (*value + self.gauss_noise(sigma)).clamp(min, max);
                        }
                    }
                }
                MutationMethod::Inversion => {
                    let (a, b) = self.random_span(child.len());
                    child[a..=b].reverse();
                }
                MutationMethod::Shift => {
                    let (a, b) = self.random_span(child.len());
                    child[a..=b].rotate_right(1);
                }
                MutationMethod::Swap => {
                    let a = self.rng.gen_range(0..child.len());
                    let b = self.rng.gen_range(0..child.len());
                    child.swap(a, b);
                }
            }
        }
    }

    fn random_span(&mut self, len: usize) -> (usize, usize) {
        let a = self.rng.gen_range(0..len);
        let b = self.rng.gen_range(0..len);
        (a.min(b), a.max(b))
    }

    fn gauss_noise(&mut self, sigma: f64) -> f64 {
        // Box-Muller transform.
        let u1: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.gen();
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn normalize_genome(genome: &mut [f64]) {
    let max = genome.iter().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for value in genome.iter_mut() {
            *value /= max;
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn scaled_weights(fitness: &[f64], pressure: f64) -> Vec<f64> {
    let min = fitness.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = fitness.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_normal() {
        return vec![1.0; fitness.len()];
    }
    fitness
        .iter()
        .map(|f| 1.0 + (pressure - 1.0) * (f - min) / (max - min))
        .collect()
}

fn rank_weights(fitness: &[f64], pressure: f64, exponent: f64) -> Vec<f64> {
    let n = fitness.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fitness[a].partial_cmp(&fitness[b]).unwrap_or(Ordering::Equal));

    let mut weights = vec![0.0; n];
    for (rank, &idx) in order.iter().enumerate() {
        let frac = if n > 1 {
            rank as f64 / (n - 1) as f64
        } else {
            1.0
        };
        // Linear ranking between (2 - pressure) and pressure, shaped by the
        // exponent.
        weights[idx] = (2.0 - pressure + 2.0 * (pressure - 1.0) * frac)
            .max(0.0)
            .powf(exponent);
    }
    weights
}
