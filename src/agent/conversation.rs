//! Transcript types and the conversation state
//!
//! The transcript is a single append-only sequence of turns. `Conversation`
//! owns it, enforces the tool-call pairing rules on every append and decides
//! what the loop should do after each assistant turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model
///
/// `arguments` is normally a JSON object. Arguments the provider sent in a
/// shape that could not be decoded are kept as-is so the invoker can report
/// them back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation token, unique within one assistant turn
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Only set on assistant turns that request tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Only set on tool turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Turn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn carrying tool calls. Empty text becomes `None`.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let content = content.into();
        Self {
            role: Role::Assistant,
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls: calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Terminal signal of an agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// Final answer given, nothing pending
    Completed,
    /// The model asked the human something
    AwaitingHumanInput,
    Failed(String),
}

/// What the loop must do after an assistant turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDisposition {
    DispatchTools,
    Completed,
    AwaitingHumanInput,
}

/// Phrase that marks an offer the human has to answer
const OFFER_PHRASE: &str = "Would you like to";

/// Classify the latest assistant turn
///
/// Tool calls always mean dispatch. Without tool calls, text containing a `?`
/// or an offer phrase waits for the human; anything else is a final answer.
pub fn evaluate_turn(turn: &Turn) -> TurnDisposition {
    if turn.has_tool_calls() {
        return TurnDisposition::DispatchTools;
    }
    let text = turn.text();
    if text.contains('?') || text.contains(OFFER_PHRASE) {
        TurnDisposition::AwaitingHumanInput
    } else {
        TurnDisposition::Completed
    }
}

/// Transcript invariant violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool turn without a tool_call_id")]
    MissingToolCallId,
    #[error("tool turn '{0}' does not answer a pending tool call")]
    UnexpectedToolResult(String),
    #[error("{count} tool call(s) still unanswered, cannot append a {role} turn")]
    UnansweredToolCalls { count: usize, role: Role },
}

/// The ordered, append-only transcript
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    /// Ids from the latest assistant turn that have no tool turn yet
    pending: Vec<String>,
}

impl Conversation {
    /// Start a transcript with the system prompt and the initial user task
    pub fn seeded(system_prompt: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt), Turn::user(task)],
            pending: Vec::new(),
        }
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), ConversationError> {
        if turn.role == Role::Tool {
            let id = turn
                .tool_call_id
                .as_deref()
                .ok_or(ConversationError::MissingToolCallId)?;
            let pos = self
                .pending
                .iter()
                .position(|p| p == id)
                .ok_or_else(|| ConversationError::UnexpectedToolResult(id.to_string()))?;
            self.pending.remove(pos);
        } else {
            if !self.pending.is_empty() {
                return Err(ConversationError::UnansweredToolCalls {
                    count: self.pending.len(),
                    role: turn.role,
                });
            }
            if turn.role == Role::Assistant {
                self.pending = turn.tool_calls.iter().map(|c| c.id.clone()).collect();
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Request payload for the model client
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    /// Disposition of the latest assistant turn, if there is one
    pub fn disposition(&self) -> Option<TurnDisposition> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(evaluate_turn)
    }
}
