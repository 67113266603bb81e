//! Optimization run configuration.

use evoagent_core::InstructionVariant;

/// Error type for engine construction.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building an engine.
///
/// Faults during a run never surface here; they are absorbed into scores.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A config value is out of range
    #[error("Invalid config: {field} {reason}")]
    InvalidConfig {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Parameters of one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Variants per generation
    pub population_size: usize,
    /// Upper bound on generations
    pub max_generations: usize,
    /// Score at which the run counts as converged
    pub threshold: f64,
    /// Probability that a mutation changes the prompt
    pub mutation_rate: f64,
    /// Starting instruction
    pub seed_instruction: InstructionVariant,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            max_generations: 50,
            threshold: 0.85,
            mutation_rate: 0.3,
            seed_instruction: InstructionVariant::default(),
        }
    }
}

impl OptimizationConfig {
    /// Create a config for the given seed instruction with default parameters.
    pub fn new(seed_instruction: InstructionVariant) -> Self {
        Self {
            seed_instruction,
            ..Default::default()
        }
    }

    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 1 {
            return Err(EngineError::InvalidConfig {
                field: "population_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_generations < 1 {
            return Err(EngineError::InvalidConfig {
                field: "max_generations",
                reason: "must be at least 1".to_string(),
            });
        }
        unit_interval("threshold", self.threshold)?;
        unit_interval("mutation_rate", self.mutation_rate)?;
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig {
            field,
            reason: format!("must be within [0, 1], got {}", value),
        })
    }
}
