//! Ollama LLM integration module
//!
//! This module provides the model client used by the agent loop: a client for
//! Ollama's `/api/chat` endpoint with tool calling.

pub mod tool_use;

// Re-export public types from the tool_use module
pub use tool_use::{
    assistant_turn, parse_tool_calls_from_text, ChatClient, ChatMessage, ChatResponse, Tool,
    ToolCall, DEFAULT_OLLAMA_URL,
};
