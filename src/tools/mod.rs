//! Tools the model can call
//!
//! - `registry` - tool definitions and their handlers, keyed by name
//! - `invoker` - validates a tool call, runs it, and turns the outcome into a `ToolResult`
//! - `builtin` - `start_vm` and `execute_code_in_vm`

pub mod builtin;
pub mod invoker;
pub mod registry;

pub use builtin::{default_registry, ExecuteCodeTool, ExecutionDefaults, StartVmTool};
pub use invoker::{ToolInvoker, ToolResult};
pub use registry::{ParamType, ParameterSpec, RegisteredTool, ToolDefinition, ToolHandler, ToolRegistry};

use thiserror::Error;

use crate::grpc::VmError;
use crate::sandbox::ExecutionError;

/// Reasons a tool call fails. Always reported back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("malformed arguments: {0}")]
    MalformedArguments(String),
    #[error("missing required argument(s): {}", .0.join(", "))]
    MissingArguments(Vec<String>),
    #[error("argument '{name}' must be {expected}")]
    InvalidArgument { name: String, expected: &'static str },
    #[error("failed to start VM: {0}")]
    Vm(#[from] VmError),
    #[error("code execution failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}
