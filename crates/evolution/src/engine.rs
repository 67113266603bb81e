//! Evolution engine - generational search over instruction variants.

use std::panic::{self, AssertUnwindSafe};

use evoagent_core::{clamp_score, GenerationRecord, InstructionVariant, OptimizationResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{Evaluator, HeuristicEvaluator, Mutator, OptimizationConfig, PhraseMutator, Result};

/// Number of trailing generations inspected for stagnation.
pub const STAGNATION_WINDOW: usize = 5;

/// Improvements below this count as no progress.
pub const MIN_IMPROVEMENT: f64 = 0.01;

/// Number of variants carried unmutated into the next generation.
pub fn elite_size(population_size: usize) -> usize {
    population_size.div_ceil(5).max(2)
}

/// Runs an evolutionary search maximizing the evaluator's score.
pub struct EvolutionEngine {
    config: OptimizationConfig,
    evaluator: Box<dyn Evaluator>,
    mutator: Box<dyn Mutator>,
    rng: StdRng,
}

impl EvolutionEngine {
    /// Create an engine with the heuristic evaluator, the phrase mutator and
    /// an OS-seeded random source.
    pub fn new(config: OptimizationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            evaluator: Box::new(HeuristicEvaluator::new()),
            mutator: Box::new(PhraseMutator::new()),
            rng: StdRng::from_os_rng(),
        })
    }

    /// Set the evaluator.
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Set the mutator.
    pub fn with_mutator(mut self, mutator: impl Mutator + 'static) -> Self {
        self.mutator = Box::new(mutator);
        self
    }

    /// Seed the random source for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Get the run configuration.
    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Build generation 0: the seed followed by `population_size - 1` mutants of it.
    pub fn initialize_population(&mut self) -> Vec<InstructionVariant> {
        let seed = self.config.seed_instruction.clone();
        let mut population = Vec::with_capacity(self.config.population_size);
        while population.len() + 1 < self.config.population_size {
            let child = self.mutate(&seed);
            population.push(child);
        }
        population.insert(0, seed);
        population
    }

    /// Score a variant. Evaluator errors, panics and non-finite scores yield `0.0`.
    pub fn evaluate(&mut self, variant: &InstructionVariant) -> f64 {
        let evaluator = &self.evaluator;
        let rng = &mut self.rng;
        match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(variant, rng))) {
            Ok(Ok(score)) => clamp_score(score),
            Ok(Err(e)) => {
                warn!("Evaluation failed, scoring 0.0: {}", e);
                0.0
            }
            Err(_) => {
                warn!("Evaluator panicked, scoring 0.0");
                0.0
            }
        }
    }

    /// Mutate a parent. Mutator errors and panics yield an unmodified copy.
    fn mutate(&mut self, parent: &InstructionVariant) -> InstructionVariant {
        let mutator = &self.mutator;
        let rng = &mut self.rng;
        let rate = self.config.mutation_rate;
        match panic::catch_unwind(AssertUnwindSafe(|| mutator.mutate(parent, rate, rng))) {
            Ok(Ok(child)) => child,
            Ok(Err(e)) => {
                warn!("Mutation failed, keeping parent: {}", e);
                parent.clone()
            }
            Err(_) => {
                warn!("Mutator panicked, keeping parent");
                parent.clone()
            }
        }
    }

    /// Run the search to completion.
    pub fn run(&mut self) -> OptimizationResult {
        let population_size = self.config.population_size;
        info!(
            "Starting optimization: population={}, max_generations={}, threshold={}",
            population_size, self.config.max_generations, self.config.threshold
        );

        let mut population = self.initialize_population();
        let mut best_score = f64::NEG_INFINITY;
        let mut best_variant = self.config.seed_instruction.clone();
        let mut history: Vec<GenerationRecord> = Vec::new();
        let mut converged = false;

        for generation in 0..self.config.max_generations {
            debug_assert_eq!(population.len(), population_size);

            let scores: Vec<f64> = population.iter().map(|v| self.evaluate(v)).collect();
            let ranking = rank(&scores);
            let leader = ranking[0];
            let previous_best = best_score;

            if scores[leader] > best_score {
                best_score = scores[leader];
                best_variant = population[leader].clone();
            }

            let improvement = if generation == 0 { 0.0 } else { best_score - previous_best };
            let avg_score = scores.iter().sum::<f64>() / scores.len() as f64;
            history.push(GenerationRecord {
                generation,
                best_score,
                avg_score,
                improvement,
            });
            debug!(
                "Generation {}: best={:.4}, avg={:.4}, improvement={:.4}",
                generation, best_score, avg_score, improvement
            );

            if best_score >= self.config.threshold {
                info!("Converged at generation {} with score {:.4}", generation, best_score);
                converged = true;
                break;
            }

            if is_stagnant(&history) {
                info!(
                    "Stopping at generation {}: no progress over {} generations",
                    generation, STAGNATION_WINDOW
                );
                break;
            }

            population = self.evolve(&population, &ranking);
        }

        let generations_run = history.len();
        if !converged && generations_run == self.config.max_generations {
            info!("Generation budget exhausted with score {:.4}", best_score);
        }

        OptimizationResult {
            success: true,
            best_score,
            best_variant,
            generations_run,
            history,
            converged,
        }
    }

    /// Build the next generation from the elite of the current one.
    fn evolve(
        &mut self,
        population: &[InstructionVariant],
        ranking: &[usize],
    ) -> Vec<InstructionVariant> {
        let size = population.len();
        let elite: Vec<InstructionVariant> = ranking
            .iter()
            .take(elite_size(size))
            .map(|&ix| population[ix].clone())
            .collect();

        let mut next = elite.clone();
        while next.len() < size {
            let parent = &elite[self.rng.random_range(0..elite.len())];
            let child = self.mutate(parent);
            next.push(child);
        }
        next
    }
}

/// Indices ordered by descending score; equal scores keep their original order.
fn rank(scores: &[f64]) -> Vec<usize> {
    let mut ranking: Vec<usize> = (0..scores.len()).collect();
    ranking.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    ranking
}

fn is_stagnant(history: &[GenerationRecord]) -> bool {
    history.len() > STAGNATION_WINDOW
        && history[history.len() - STAGNATION_WINDOW..]
            .iter()
            .all(|r| r.improvement < MIN_IMPROVEMENT)
}
