//! Evolution layer - evolutionary optimization of agent instructions.
//!
//! The [`EvolutionEngine`] owns a population of [`InstructionVariant`]s and
//! improves it generation by generation against an injected [`Evaluator`],
//! producing children with an injected [`Mutator`].
//!
//! [`InstructionVariant`]: evoagent_core::InstructionVariant

#![warn(missing_docs)]

mod config;
mod evaluator;
mod mutator;
mod engine;

pub use config::{OptimizationConfig, EngineError, Result};
pub use evaluator::{Evaluator, EvaluationError, HeuristicEvaluator};
pub use mutator::{Mutator, MutationError, PhraseMutator, IMPROVEMENT_PHRASES};
pub use engine::{EvolutionEngine, elite_size, STAGNATION_WINDOW, MIN_IMPROVEMENT};
