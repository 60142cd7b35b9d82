//! Agent module for LLM-driven VM control
//!
//! This module provides the agent loop that orchestrates:
//! - the model client (Ollama /api/chat with tools)
//! - tool dispatch (`start_vm`, `execute_code_in_vm`)
//! - the append-only transcript and its termination policy
//!
//! # Architecture
//!
//! ```text
//! User Task → AgentLoop → ModelClient (transcript + tool catalog)
//!                  ↓
//!        assistant turn with tool calls?
//!         ├─ yes → ToolInvoker → ToolRegistry → VM service / code execution service
//!         │           ↓
//!         │     tool turns appended in call order → ask the model again
//!         └─ no  → final answer → Completed
//!                  question     → wait for the human → ask the model again
//! ```

pub mod controller;
pub mod conversation;
pub mod model;
pub mod sessions;

pub use controller::{AgentConfig, AgentLoop, AgentReport, HumanInput, LoopState, StdinInput};
pub use conversation::{
    evaluate_turn, AgentOutcome, Conversation, ConversationError, Role, ToolCallRequest, Turn,
    TurnDisposition,
};
pub use model::{ModelClient, ModelError};
pub use sessions::{Session, SessionStore};
