//! HTTP client for the code execution service
//!
//! `POST {server}/execute` with a JSON body, answered by a JSON object with
//! `output`, `error` and `status`. Non-2xx answers and bodies that are not
//! such an object are errors.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Body of an execute request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub lang: String,
    /// File name -> file contents
    pub files: BTreeMap<String, String>,
    pub entry_point: String,
    pub dependencies: Vec<String>,
    /// Limit on the remote run, in seconds
    pub timeout: u64,
}

/// Decoded response of the execution service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecuteOutput {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: serde_json::Value,
}

impl ExecuteOutput {
    pub fn status_text(&self) -> String {
        match &self.status {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Text handed back to the model
    pub fn render(&self) -> String {
        format!(
            "Status: {}\nOutput:\n{}\nError:\n{}",
            self.status_text(),
            self.output.as_deref().unwrap_or(""),
            self.error.as_deref().unwrap_or(""),
        )
    }
}

/// Error type for code execution calls
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("execution service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Runs code on an execution server
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(
        &self,
        server_addr: &str,
        request: &ExecuteRequest,
    ) -> Result<ExecuteOutput, ExecutionError>;
}

/// `CodeExecutor` over HTTP
///
/// The client has its own connect and response timeouts; the request's
/// `timeout` field only bounds the remote run.
#[derive(Clone)]
pub struct HttpCodeExecutor {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpCodeExecutor {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// True when the remote run may outlive the HTTP call
    fn outlives_client(&self, request: &ExecuteRequest) -> bool {
        Duration::from_secs(request.timeout) > self.request_timeout
    }
}

#[async_trait]
impl CodeExecutor for HttpCodeExecutor {
    async fn execute(
        &self,
        server_addr: &str,
        request: &ExecuteRequest,
    ) -> Result<ExecuteOutput, ExecutionError> {
        let endpoint = execute_url(server_addr);
        if self.outlives_client(request) {
            warn!(
                timeout_secs = request.timeout,
                client_timeout_secs = self.request_timeout.as_secs(),
                "Execution timeout exceeds the HTTP client timeout"
            );
        }
        debug!(endpoint = %endpoint, lang = %request.lang, files = request.files.len(), "Sending execute request");

        let response = self.client.post(&endpoint).json(request).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn execute_url(server_addr: &str) -> String {
    let base = server_addr.trim_end_matches('/');
    if base.contains("://") {
        format!("{}/execute", base)
    } else {
        format!("http://{}/execute", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_url() {
        assert_eq!(execute_url("http://localhost:8000"), "http://localhost:8000/execute");
        assert_eq!(execute_url("http://localhost:8000/"), "http://localhost:8000/execute");
        assert_eq!(execute_url("10.0.0.5:8000"), "http://10.0.0.5:8000/execute");
    }

    #[test]
    fn test_timeout_longer_than_client() {
        let executor =
            HttpCodeExecutor::new(Duration::from_secs(5), Duration::from_secs(120)).unwrap();
        let mut request = ExecuteRequest {
            lang: "python".to_string(),
            files: BTreeMap::new(),
            entry_point: "main.py".to_string(),
            dependencies: Vec::new(),
            timeout: 120,
        };
        assert!(!executor.outlives_client(&request));
        request.timeout = 300;
        assert!(executor.outlives_client(&request));
    }

    #[test]
    fn test_request_body_shape() {
        let request = ExecuteRequest {
            lang: "python".to_string(),
            files: BTreeMap::from([("main.py".to_string(), "print(1)".to_string())]),
            entry_point: "main.py".to_string(),
            dependencies: vec!["numpy".to_string()],
            timeout: 30,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "lang": "python",
                "files": {"main.py": "print(1)"},
                "entry_point": "main.py",
                "dependencies": ["numpy"],
                "timeout": 30
            })
        );
    }

    #[test]
    fn test_output_defaults_and_render() {
        let out: ExecuteOutput = serde_json::from_str(r#"{"output": "1\n"}"#).unwrap();
        assert_eq!(out.status_text(), "");
        assert_eq!(out.render(), "Status: \nOutput:\n1\n\nError:\n");

        let out: ExecuteOutput =
            serde_json::from_str(r#"{"output": null, "error": "boom", "status": 1}"#).unwrap();
        assert_eq!(out.status_text(), "1");
        assert!(out.render().contains("Error:\nboom"));
    }

    #[test]
    fn test_non_object_response_rejected() {
        assert!(serde_json::from_str::<ExecuteOutput>("[1, 2]").is_err());
        assert!(serde_json::from_str::<ExecuteOutput>("not json").is_err());
    }
}
