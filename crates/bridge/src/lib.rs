//! Request/response bridge
//!
//! Exposes the evolution engine to a caller process as a line-delimited
//! JSON service.

#![warn(missing_docs)]

pub mod protocol;
pub mod registry;
pub mod handlers;
pub mod server;

pub use protocol::{Request, Response, BridgeError, Result};
pub use registry::{CommandHandler, HandlerRegistry};
pub use handlers::{
    OptimizeHandler, OptimizeRequest, OptimizeReport, EvaluateHandler, EvaluateRequest,
    MutateHandler, MutateRequest, PingHandler, CommandsHandler,
};
pub use server::{Bridge, BridgeConfig};
