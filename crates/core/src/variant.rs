//! Instruction variant - the agent instruction document being optimized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One candidate agent instruction.
///
/// The two fields the optimizer knows about are typed; every other key of the
/// incoming document is kept in [`InstructionVariant::extra`] and written back
/// unchanged, so callers can round-trip documents this crate does not model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionVariant {
    /// System prompt text
    #[serde(rename = "systemPrompt", default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,

    /// Few-shot example records
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,

    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstructionVariant {
    /// Create a variant with the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    /// Set the example records.
    pub fn with_examples(mut self, examples: Vec<Value>) -> Self {
        self.examples = examples;
        self
    }

    /// Number of example records.
    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    /// Append a line to the system prompt.
    pub fn append_to_prompt(&mut self, text: &str) {
        if !self.system_prompt.is_empty() {
            self.system_prompt.push('\n');
        }
        self.system_prompt.push_str(text);
    }
}
