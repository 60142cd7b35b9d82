//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::conversation::{ToolCallRequest, Turn};
use crate::agent::model::{ModelClient, ModelError};
use crate::tools::ToolDefinition;

/// Default Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Name of the tool a "tool" message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let tool_calls = if turn.tool_calls.is_empty() {
            None
        } else {
            Some(turn.tool_calls.iter().map(ToolCall::from).collect())
        };
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.text().to_string(),
            tool_calls,
            tool_name: turn.tool_name.clone(),
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

impl From<&ToolCallRequest> for ToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            id: Some(call.id.clone()),
            function: FunctionCall {
                name: call.tool_name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

impl From<&ToolDefinition> for Tool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters_schema(),
            },
        }
    }
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Send a chat request with optional tools
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `model` - The model name (e.g., "qwen3")
    /// * `tools` - Optional list of tools the model can use
    ///
    /// # Returns
    /// ChatResponse containing the model's reply and any tool calls
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ModelError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": 0.0
            }
        });

        if let Some(t) = tools {
            body["tools"] = serde_json::to_value(t)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        Ok(chat_response)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(
        &self,
        model: &str,
        transcript: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<Turn, ModelError> {
        let messages = transcript.iter().map(ChatMessage::from).collect();
        let catalog = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(Tool::from).collect())
        };

        let response = self.chat(messages, model, catalog).await?;
        let known: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        Ok(assistant_turn(response.message, &known))
    }
}

/// Convert a reply into an assistant turn
///
/// Native tool calls win; otherwise tool calls written as JSON in the text
/// are recovered if they name a known tool. Missing or repeated ids are
/// replaced with generated ones.
pub fn assistant_turn(message: ChatMessage, known_tools: &[&str]) -> Turn {
    let native = message.tool_calls.unwrap_or_default();
    let calls = if native.is_empty() {
        parse_tool_calls_from_text(&message.content)
            .into_iter()
            .filter(|c| known_tools.contains(&c.function.name.as_str()))
            .collect()
    } else {
        native
    };

    let mut seen = HashSet::new();
    let requests = calls
        .into_iter()
        .map(|call| {
            let id = call
                .id
                .filter(|id| !id.is_empty() && !seen.contains(id))
                .unwrap_or_else(new_call_id);
            seen.insert(id.clone());
            ToolCallRequest {
                id,
                tool_name: call.function.name,
                arguments: decode_arguments(call.function.arguments),
            }
        })
        .collect();

    Turn::assistant_with_calls(message.content, requests)
}

fn new_call_id() -> String {
    format!("call_{}", Uuid::now_v7().simple())
}

/// Arguments may arrive as a JSON-encoded string. Anything that does not
/// decode to an object is left as-is for the invoker to reject.
fn decode_arguments(arguments: serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::String(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => serde_json::Value::String(raw),
        },
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    }
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field. Every `{` is tried as the
/// start of a JSON value; a parsed value is skipped as a whole, so braces
/// inside its strings and nested objects are never scanned.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();
    let mut pos = 0;

    while let Some(offset) = content[pos..].find('{') {
        let start = pos + offset;
        let mut values =
            serde_json::Deserializer::from_str(&content[start..]).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(value)) => {
                if let Some(tool_call) = tool_call_from_value(&value) {
                    tool_calls.push(tool_call);
                }
                pos = start + values.byte_offset();
            }
            _ => pos = start + 1,
        }
    }

    tool_calls
}

/// Accepts `{"name": ..., "arguments": {...}}`, with `parameters` as an alias
fn tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    let name = value.get("name").and_then(|n| n.as_str())?;
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    Some(ToolCall {
        id: None,
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    })
}
