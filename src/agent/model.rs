//! Model client seam
//!
//! The agent loop only sees this trait. A transport or decoding failure is an
//! `Err`, never a value that looks like an assistant turn.

use async_trait::async_trait;
use thiserror::Error;

use super::conversation::Turn;
use crate::tools::ToolDefinition;

/// Error type for model calls
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty response from model")]
    EmptyResponse,
    #[error("{0}")]
    Other(String),
}

/// Produces the next assistant turn for a transcript
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask `model` for the next assistant turn given the transcript and the tool catalog
    async fn complete(
        &self,
        model: &str,
        transcript: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<Turn, ModelError>;
}
