//! vmagent - LLM agent that starts VMs and runs code inside them
//!
//! The agent keeps one append-only transcript, sends it to an Ollama model
//! together with the tool catalog, and executes the tool calls the model
//! requests against a VM management gRPC service and a code execution server.
//!
//! # Modules
//!
//! - `agent` - transcript, termination policy and the agent loop
//! - `tools` - tool registry, invoker and the built-in tools
//! - `ollama` - model client for Ollama's `/api/chat`
//! - `grpc` - VM management service client
//! - `sandbox` - code execution service client
//! - `config` - command line and environment configuration
//! - `console` - colored transcript echo
//! - `tracing` - logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vmagent::{default_registry, AgentConfig, AgentLoop, ChatClient, StdinInput, ToolInvoker};
//!
//! let registry = default_registry(vms, executor, defaults)?;
//! let mut agent = AgentLoop::new(
//!     AgentConfig::new("qwen3", "You control VMs."),
//!     Arc::new(ChatClient::new("http://localhost:11434")),
//!     ToolInvoker::new(registry),
//!     "Start a VM named test",
//! );
//! let report = agent.run(&mut StdinInput::new()).await;
//! ```

pub mod agent;
pub mod config;
pub mod console;
pub mod grpc;
pub mod ollama;
pub mod sandbox;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentLoop, AgentOutcome, AgentReport, StdinInput, Turn};
pub use grpc::GrpcVmManager;
pub use ollama::ChatClient;
pub use sandbox::HttpCodeExecutor;
pub use tools::{default_registry, ExecutionDefaults, ToolInvoker};
