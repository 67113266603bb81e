//! Mutation of instruction variants.

use evoagent_core::InstructionVariant;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

/// Errors a mutator may report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// Mutation rate outside `[0, 1]`
    #[error("Invalid mutation rate: {0}")]
    InvalidRate(f64),

    /// Mutation could not be produced
    #[error("Mutation failed: {0}")]
    Failed(String),
}

/// Produces a new variant from a parent.
///
/// The parent is borrowed immutably and the child is returned by value, so a
/// mutation can never be observed through the parent.
pub trait Mutator: Send + Sync {
    /// Derive a child from `parent`.
    fn mutate(
        &self,
        parent: &InstructionVariant,
        rate: f64,
        rng: &mut dyn RngCore,
    ) -> Result<InstructionVariant, MutationError>;
}

impl<F> Mutator for F
where
    F: Fn(&InstructionVariant, f64) -> Result<InstructionVariant, MutationError> + Send + Sync,
{
    fn mutate(
        &self,
        parent: &InstructionVariant,
        rate: f64,
        _rng: &mut dyn RngCore,
    ) -> Result<InstructionVariant, MutationError> {
        self(parent, rate)
    }
}

/// Phrases the default mutator appends to a system prompt.
pub const IMPROVEMENT_PHRASES: &[&str] = &[
    "Add step-by-step detail to your reasoning.",
    "Request specific examples when the task is ambiguous.",
    "State the constraints you are working under.",
    "Structure the answer with clear headings.",
    "Verify the result against the original request.",
    "Keep the answer concise and focused.",
];

/// Appends catalog phrases to the system prompt.
#[derive(Debug, Clone)]
pub struct PhraseMutator {
    catalog: Vec<String>,
}

impl PhraseMutator {
    /// Create a mutator over [`IMPROVEMENT_PHRASES`].
    pub fn new() -> Self {
        Self::with_catalog(IMPROVEMENT_PHRASES.iter().map(|p| p.to_string()).collect())
    }

    /// Create a mutator over a custom phrase catalog.
    pub fn with_catalog(catalog: Vec<String>) -> Self {
        Self { catalog }
    }

    /// The phrase catalog.
    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }
}

impl Default for PhraseMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutator for PhraseMutator {
    fn mutate(
        &self,
        parent: &InstructionVariant,
        rate: f64,
        rng: &mut dyn RngCore,
    ) -> Result<InstructionVariant, MutationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(MutationError::InvalidRate(rate));
        }

        let mut child = parent.clone();
        if !rng.random_bool(rate) {
            return Ok(child);
        }

        let Some(phrase) = self.catalog.choose(rng) else {
            return Err(MutationError::Failed("phrase catalog is empty".to_string()));
        };
        // Never append a phrase twice.
        if !child.system_prompt.contains(phrase.as_str()) {
            child.append_to_prompt(phrase);
        }
        Ok(child)
    }
}
