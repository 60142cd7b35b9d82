//! Process configuration
//!
//! Command-line flags (with environment fallbacks) plus the system prompt,
//! which only comes from the environment (`VMAGENT_SYSTEM_PROMPT`, `.env`
//! included). Built once at startup and handed to the pieces that need it.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::agent::AgentConfig;
use crate::grpc::DEFAULT_VM_SERVER;
use crate::ollama::DEFAULT_OLLAMA_URL;
use crate::tools::ExecutionDefaults;

pub const SYSTEM_PROMPT_ENV: &str = "VMAGENT_SYSTEM_PROMPT";
pub const DEFAULT_CODE_SERVER: &str = "http://localhost:8000";

/// LLM agent that starts VMs and runs code inside them
#[derive(Parser, Debug, Clone)]
#[command(name = "vmagent", version)]
pub struct Cli {
    /// Initial problem statement for the agent
    #[arg(short, long)]
    pub prompt: String,

    /// Model name passed to Ollama
    #[arg(long, env = "VMAGENT_MODEL", default_value = "qwen3")]
    pub model: String,

    /// Base URL of the Ollama server
    #[arg(long, env = "VMAGENT_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Address of the VM management gRPC service
    #[arg(long, env = "VMAGENT_VM_SERVER", default_value = DEFAULT_VM_SERVER)]
    pub vm_server: String,

    /// Code execution server used when a tool call does not name one
    #[arg(long, env = "VMAGENT_CODE_SERVER", default_value = DEFAULT_CODE_SERVER)]
    pub code_server: String,

    /// Execution timeout in seconds used when a tool call does not set one
    #[arg(long, env = "VMAGENT_EXEC_TIMEOUT", default_value_t = 30)]
    pub exec_timeout: u64,

    /// Overall HTTP timeout in seconds for code execution requests
    #[arg(long, env = "VMAGENT_HTTP_TIMEOUT", default_value_t = 120)]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds for code execution requests
    #[arg(long, env = "VMAGENT_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Maximum number of model calls per run
    #[arg(long, env = "VMAGENT_MAX_ITERATIONS", default_value_t = 25)]
    pub max_iterations: usize,

    /// Directory to save the session transcript in
    #[arg(long, env = "VMAGENT_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// OTLP endpoint for trace export (e.g. http://localhost:4316)
    #[arg(long, env = "VMAGENT_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("system prompt is not set (export VMAGENT_SYSTEM_PROMPT or add it to .env)")]
    MissingSystemPrompt,
    #[error("the initial prompt is empty")]
    EmptyPrompt,
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Resolved configuration for one process
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub task: String,
    pub system_prompt: String,
    pub model: String,
    pub ollama_url: String,
    pub vm_server: String,
    pub code_server: String,
    pub exec_timeout_secs: u64,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_iterations: usize,
    pub session_dir: Option<PathBuf>,
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Resolve from parsed flags and the process environment
    pub fn from_env(cli: Cli) -> Result<Self, ConfigError> {
        Self::from_cli(cli, |key| std::env::var(key).ok())
    }

    /// Resolve from parsed flags, reading environment values through `lookup`
    pub fn from_cli<F>(cli: Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let system_prompt = lookup(SYSTEM_PROMPT_ENV)
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingSystemPrompt)?;

        if cli.prompt.trim().is_empty() {
            return Err(ConfigError::EmptyPrompt);
        }
        if cli.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max-iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if cli.http_timeout == 0 || cli.connect_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                name: "http-timeout/connect-timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            task: cli.prompt,
            system_prompt,
            model: cli.model,
            ollama_url: cli.ollama_url,
            vm_server: cli.vm_server,
            code_server: cli.code_server,
            exec_timeout_secs: cli.exec_timeout,
            http_timeout: Duration::from_secs(cli.http_timeout),
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            max_iterations: cli.max_iterations,
            session_dir: cli.session_dir,
            otlp_endpoint: cli.otlp_endpoint.filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            ..AgentConfig::new(self.model.clone(), self.system_prompt.clone())
        }
    }

    pub fn execution_defaults(&self) -> ExecutionDefaults {
        ExecutionDefaults {
            code_server_addr: self.code_server.clone(),
            timeout_secs: self.exec_timeout_secs,
        }
    }
}
