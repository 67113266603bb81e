//! Built-in command handlers.

use async_trait::async_trait;
use evoagent_core::{InstructionVariant, OptimizationResult};
use evoagent_evolution::{
    Evaluator, EvolutionEngine, HeuristicEvaluator, Mutator, OptimizationConfig, PhraseMutator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{BridgeError, CommandHandler, Result};

fn parse_payload<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| BridgeError::InvalidPayload(e.to_string()))
}

fn request_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Payload of the `optimize` command. Missing fields fall back to the
/// handler's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizeRequest {
    /// Variants per generation
    pub population_size: Option<usize>,
    /// Upper bound on generations
    pub max_generations: Option<usize>,
    /// Convergence threshold
    pub threshold: Option<f64>,
    /// Mutation probability
    pub mutation_rate: Option<f64>,
    /// Seed instruction document
    pub agent_instruction: Option<InstructionVariant>,
    /// Accepted for compatibility, never executed
    pub evaluator_code: Option<String>,
    /// Accepted for compatibility, never executed
    pub mutator_code: Option<String>,
    /// Random seed for a reproducible run
    pub seed: Option<u64>,
}

/// Result body of the `optimize` command.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeReport {
    /// Engine result
    #[serde(flatten)]
    pub result: OptimizationResult,
    /// Same as `generations_run`, kept for older callers
    pub generations: usize,
}

impl From<OptimizationResult> for OptimizeReport {
    fn from(result: OptimizationResult) -> Self {
        let generations = result.generations_run;
        Self { result, generations }
    }
}

/// Runs the evolutionary engine.
pub struct OptimizeHandler {
    defaults: OptimizationConfig,
    base_seed: Option<u64>,
}

impl OptimizeHandler {
    /// Create a handler with the given parameter defaults.
    pub fn new(defaults: OptimizationConfig, base_seed: Option<u64>) -> Self {
        Self { defaults, base_seed }
    }

    /// Build the engine config for a request.
    pub fn build_config(&self, request: &OptimizeRequest) -> OptimizationConfig {
        OptimizationConfig {
            population_size: request.population_size.unwrap_or(self.defaults.population_size),
            max_generations: request.max_generations.unwrap_or(self.defaults.max_generations),
            threshold: request.threshold.unwrap_or(self.defaults.threshold),
            mutation_rate: request.mutation_rate.unwrap_or(self.defaults.mutation_rate),
            seed_instruction: request
                .agent_instruction
                .clone()
                .unwrap_or_else(|| self.defaults.seed_instruction.clone()),
        }
    }
}

#[async_trait]
impl CommandHandler for OptimizeHandler {
    async fn handle(&self, data: Value) -> Result<Value> {
        let request: OptimizeRequest = parse_payload(data)?;
        if request.evaluator_code.is_some() || request.mutator_code.is_some() {
            debug!("Ignoring evaluator_code/mutator_code; built-in strategies are used");
        }

        let mut engine = EvolutionEngine::new(self.build_config(&request))?;
        if let Some(seed) = request.seed.or(self.base_seed) {
            engine = engine.with_seed(seed);
        }

        let result = tokio::task::spawn_blocking(move || engine.run())
            .await
            .map_err(|e| BridgeError::Handler(format!("optimization task failed: {}", e)))?;
        info!(
            "Optimization finished: score={:.4}, generations={}, converged={}",
            result.best_score, result.generations_run, result.converged
        );

        Ok(serde_json::to_value(OptimizeReport::from(result))?)
    }
}

/// Payload of the `evaluate` command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluateRequest {
    /// Instruction to score
    pub agent_instruction: Option<InstructionVariant>,
    /// Random seed for the jitter
    pub seed: Option<u64>,
}

/// Scores one instruction with the heuristic evaluator.
pub struct EvaluateHandler {
    evaluator: HeuristicEvaluator,
    base_seed: Option<u64>,
}

impl EvaluateHandler {
    /// Create a handler.
    pub fn new(base_seed: Option<u64>) -> Self {
        Self {
            evaluator: HeuristicEvaluator::new(),
            base_seed,
        }
    }
}

#[async_trait]
impl CommandHandler for EvaluateHandler {
    async fn handle(&self, data: Value) -> Result<Value> {
        let request: EvaluateRequest = parse_payload(data)?;
        let variant = request.agent_instruction.unwrap_or_default();
        let mut rng = request_rng(request.seed.or(self.base_seed));
        let score = self.evaluator.evaluate(&variant, &mut rng)?;
        Ok(json!({ "score": score }))
    }
}

/// Payload of the `mutate` command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutateRequest {
    /// Parent instruction
    pub agent_instruction: Option<InstructionVariant>,
    /// Mutation probability
    pub mutation_rate: Option<f64>,
    /// Random seed
    pub seed: Option<u64>,
}

/// Applies the phrase mutator once.
pub struct MutateHandler {
    mutator: PhraseMutator,
    default_rate: f64,
    base_seed: Option<u64>,
}

impl MutateHandler {
    /// Create a handler.
    pub fn new(default_rate: f64, base_seed: Option<u64>) -> Self {
        Self {
            mutator: PhraseMutator::new(),
            default_rate,
            base_seed,
        }
    }
}

#[async_trait]
impl CommandHandler for MutateHandler {
    async fn handle(&self, data: Value) -> Result<Value> {
        let request: MutateRequest = parse_payload(data)?;
        let parent = request.agent_instruction.unwrap_or_default();
        let rate = request.mutation_rate.unwrap_or(self.default_rate);
        let mut rng = request_rng(request.seed.or(self.base_seed));
        let variant = self.mutator.mutate(&parent, rate, &mut rng)?;
        Ok(json!({ "variant": variant }))
    }
}

/// Liveness check.
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, _data: Value) -> Result<Value> {
        Ok(json!({ "status": "pong" }))
    }
}

/// Lists the registered commands.
pub struct CommandsHandler {
    names: Vec<String>,
}

impl CommandsHandler {
    /// Create a handler answering with the given names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl CommandHandler for CommandsHandler {
    async fn handle(&self, _data: Value) -> Result<Value> {
        Ok(json!({ "commands": self.names }))
    }
}
