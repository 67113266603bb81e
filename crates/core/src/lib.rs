//! EvoAgent core data models.
//!
//! Defines the instruction document being optimized and the records an
//! optimization run produces.

#![warn(missing_docs)]

mod variant;
mod record;

pub use variant::InstructionVariant;
pub use record::{GenerationRecord, OptimizationResult};

/// Clamp a raw score into `[0, 1]`; non-finite values become `0.0`.
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
