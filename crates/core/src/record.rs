//! Generation history and optimization results.

use serde::{Deserialize, Serialize};

use crate::InstructionVariant;

/// Summary of one completed generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Zero-based generation index
    pub generation: usize,
    /// Running best score after this generation
    pub best_score: f64,
    /// Mean score of this generation's population
    pub avg_score: f64,
    /// Gain of the running best over the previous generation
    pub improvement: f64,
}

/// Outcome of a complete optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Whether the run completed
    pub success: bool,
    /// Best score found
    pub best_score: f64,
    /// Variant that first reached `best_score`
    pub best_variant: InstructionVariant,
    /// Number of generations executed (1-based)
    pub generations_run: usize,
    /// One record per executed generation
    pub history: Vec<GenerationRecord>,
    /// Whether the threshold was reached
    pub converged: bool,
}

impl OptimizationResult {
    /// Record of the last executed generation, if any.
    pub fn final_record(&self) -> Option<&GenerationRecord> {
        self.history.last()
    }
}
