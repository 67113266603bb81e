//! Fitness evaluation of instruction variants.

use evoagent_core::{clamp_score, InstructionVariant};
use rand::{Rng, RngCore};

/// Errors an evaluator may report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Scoring could not be completed
    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Scores an instruction variant.
///
/// Implementations should return a value in `[0, 1]`; the engine clamps
/// whatever they return and treats errors as a score of `0.0`.
pub trait Evaluator: Send + Sync {
    /// Score a variant.
    fn evaluate(
        &self,
        variant: &InstructionVariant,
        rng: &mut dyn RngCore,
    ) -> Result<f64, EvaluationError>;
}

impl<F> Evaluator for F
where
    F: Fn(&InstructionVariant) -> Result<f64, EvaluationError> + Send + Sync,
{
    fn evaluate(
        &self,
        variant: &InstructionVariant,
        _rng: &mut dyn RngCore,
    ) -> Result<f64, EvaluationError> {
        self(variant)
    }
}

const BASE_SCORE: f64 = 0.5;
const LONG_PROMPT_CHARS: usize = 500;
const LONG_PROMPT_BONUS: f64 = 0.1;
const PER_EXAMPLE_BONUS: f64 = 0.05;
const EXAMPLE_BONUS_CAP: f64 = 0.2;
const FEATURE_BONUS: f64 = 0.05;
const FORMAT_MARKERS: &[&str] = &["##", "**", "```"];

/// Heuristic placeholder evaluator.
///
/// Rewards long prompts, few-shot examples, formatting, and mentions of
/// examples and constraints, plus a small random jitter.
#[derive(Debug, Clone)]
pub struct HeuristicEvaluator {
    jitter: f64,
}

impl HeuristicEvaluator {
    /// Create an evaluator with the default jitter of `0.1`.
    pub fn new() -> Self {
        Self { jitter: 0.1 }
    }

    /// Set the jitter amplitude. `0.0` makes scoring deterministic.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }

    /// Score without jitter.
    pub fn base_score(&self, variant: &InstructionVariant) -> f64 {
        let prompt = &variant.system_prompt;
        let lower = prompt.to_lowercase();

        let mut score = BASE_SCORE;
        if prompt.chars().count() > LONG_PROMPT_CHARS {
            score += LONG_PROMPT_BONUS;
        }
        score += (PER_EXAMPLE_BONUS * variant.example_count() as f64).min(EXAMPLE_BONUS_CAP);
        if has_format_marker(prompt) {
            score += FEATURE_BONUS;
        }
        if lower.contains("example") {
            score += FEATURE_BONUS;
        }
        if lower.contains("constraint") {
            score += FEATURE_BONUS;
        }
        score
    }
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for HeuristicEvaluator {
    fn evaluate(
        &self,
        variant: &InstructionVariant,
        rng: &mut dyn RngCore,
    ) -> Result<f64, EvaluationError> {
        let mut score = self.base_score(variant);
        if self.jitter > 0.0 {
            score += rng.random_range(-self.jitter..=self.jitter);
        }
        Ok(clamp_score(score))
    }
}

fn has_format_marker(prompt: &str) -> bool {
    FORMAT_MARKERS.iter().any(|m| prompt.contains(m))
        || prompt.lines().any(|line| line.trim_start().starts_with("- "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_plain_prompt_scores_base() {
        let evaluator = HeuristicEvaluator::new();
        assert!(close(evaluator.base_score(&InstructionVariant::new("Be helpful.")), 0.5));
    }

    #[test]
    fn test_example_bonus_is_capped() {
        let evaluator = HeuristicEvaluator::new();
        let two = InstructionVariant::new("x").with_examples(vec![json!({}); 2]);
        let ten = InstructionVariant::new("x").with_examples(vec![json!({}); 10]);

        assert!(close(evaluator.base_score(&two), 0.6));
        assert!(close(evaluator.base_score(&ten), 0.7));
    }

    #[test]
    fn test_feature_bonuses() {
        let evaluator = HeuristicEvaluator::new();
        let prompt = format!(
            "## Role\nGive an EXAMPLE and respect every Constraint.\n{}",
            "a".repeat(LONG_PROMPT_CHARS)
        );
        let variant = InstructionVariant::new(prompt);

        // base + long + marker + example + constraint
        assert!(close(evaluator.base_score(&variant), 0.75));
    }

    #[test]
    fn test_bullet_line_counts_as_format_marker() {
        assert!(has_format_marker("Steps:\n  - read\n  - write"));
        assert!(!has_format_marker("no-format here"));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let evaluator = HeuristicEvaluator::new();
        let variant = InstructionVariant::new("plain");
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let score = evaluator.evaluate(&variant, &mut rng).unwrap();
            assert!((0.4..=0.6).contains(&score), "score {} out of range", score);
        }
    }

    #[test]
    fn test_score_is_clamped() {
        let evaluator = HeuristicEvaluator::new().with_jitter(0.0);
        let prompt = format!("## example constraint {}", "a".repeat(600));
        let variant = InstructionVariant::new(prompt).with_examples(vec![json!({}); 8]);
        let mut rng = StdRng::seed_from_u64(1);

        let score = evaluator.evaluate(&variant, &mut rng).unwrap();
        assert!(score <= 1.0);
        assert!(close(score, 0.95));
    }

    #[test]
    fn test_closure_evaluator() {
        let evaluator = |variant: &InstructionVariant| -> Result<f64, EvaluationError> {
            Ok(variant.system_prompt.len() as f64 / 10.0)
        };
        let mut rng = StdRng::seed_from_u64(0);
        let score = evaluator.evaluate(&InstructionVariant::new("abc"), &mut rng).unwrap();
        assert!(close(score, 0.3));
    }
}
