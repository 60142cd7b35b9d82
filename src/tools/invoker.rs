//! Tool invocation
//!
//! `ToolInvoker::invoke` never fails: unknown tools, bad arguments and
//! collaborator errors all come back as a `ToolResult` with
//! `succeeded == false` so the model can react to them.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::registry::ToolRegistry;
use super::ToolError;
use crate::agent::conversation::{ToolCallRequest, Turn};

/// Outcome of one tool call, ready to be appended as a tool turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    pub succeeded: bool,
}

impl ToolResult {
    fn success(call: &ToolCallRequest, content: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            content,
            succeeded: true,
        }
    }

    fn failure(call: &ToolCallRequest, error: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            content: format!("Error: {}", error),
            succeeded: false,
        }
    }

    pub fn into_turn(self) -> Turn {
        Turn::tool(self.tool_call_id, self.tool_name, self.content)
    }
}

/// Dispatches tool calls through a registry
#[derive(Clone)]
pub struct ToolInvoker {
    registry: ToolRegistry,
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolResult {
        info!(
            tool = %call.tool_name,
            call_id = %call.id,
            arguments = %call.arguments,
            "Dispatching tool call"
        );

        let result = match self.try_invoke(call).await {
            Ok(content) => ToolResult::success(call, content),
            Err(e) => {
                warn!(tool = %call.tool_name, call_id = %call.id, error = %e, "Tool call failed");
                ToolResult::failure(call, &e)
            }
        };

        info!(
            tool = %result.tool_name,
            call_id = %result.tool_call_id,
            succeeded = result.succeeded,
            result = %result.content,
            "Tool call finished"
        );
        result
    }

    async fn try_invoke(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let tool = self.registry.lookup(&call.tool_name)?;

        let args = call.arguments.as_object().ok_or_else(|| {
            ToolError::MalformedArguments(format!(
                "expected a JSON object, got {}",
                call.arguments
            ))
        })?;
        tool.definition.validate(args)?;

        tool.handler.call(args).await
    }
}
