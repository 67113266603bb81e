//! Wire types for the line-delimited protocol.

use evoagent_evolution::{EngineError, EvaluationError, MutationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while serving requests.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Input line is not a valid request envelope
    #[error("Parse error: {0}")]
    Parse(String),

    /// No handler registered under this name
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Request data does not match the command's payload
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Engine rejected its configuration
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Evaluation error
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Mutation error
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Handler failed for another reason
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// One request line: `{"command": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Command name
    pub command: String,
    /// Command payload
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl Request {
    /// Parse a request from one input line.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| BridgeError::Parse(e.to_string()))
    }
}

/// One response line.
///
/// Successful responses carry `command` and `result`; failures carry
/// `error`, plus `command` whenever the request got far enough to name one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the command succeeded
    pub success: bool,
    /// Command being answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Handler result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response.
    pub fn ok(command: impl Into<String>, result: Value) -> Self {
        Self {
            success: true,
            command: Some(command.into()),
            result: Some(result),
            error: None,
        }
    }

    /// Failed response.
    pub fn err(command: Option<String>, error: &BridgeError) -> Self {
        Self {
            success: false,
            command,
            result: None,
            error: Some(error.to_string()),
        }
    }
}
