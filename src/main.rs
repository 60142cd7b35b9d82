use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use vmagent::agent::{AgentLoop, AgentOutcome, AgentReport, Session, SessionStore, StdinInput};
use vmagent::config::{AppConfig, Cli};
use vmagent::tracing::{init_tracing, shutdown_tracing};
use vmagent::{default_registry, ChatClient, GrpcVmManager, HttpCodeExecutor, ToolInvoker};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match AppConfig::from_env(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing("vmagent", config.otlp_endpoint.as_deref()) {
        eprintln!("{} failed to initialize tracing: {}", "error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let code = run(&config).await;

    if config.otlp_endpoint.is_some() {
        shutdown_tracing();
    }
    code
}

async fn run(config: &AppConfig) -> ExitCode {
    let executor = match HttpCodeExecutor::new(config.connect_timeout, config.http_timeout) {
        Ok(executor) => executor,
        Err(e) => {
            error!(error = %e, "Failed to build code execution client");
            return ExitCode::FAILURE;
        }
    };
    let vms = GrpcVmManager::new(config.vm_server.clone());

    let registry = match default_registry(
        Arc::new(vms),
        Arc::new(executor),
        config.execution_defaults(),
    ) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to register tools");
            return ExitCode::FAILURE;
        }
    };

    info!(
        model = %config.model,
        ollama = %config.ollama_url,
        vm_server = %config.vm_server,
        code_server = %config.code_server,
        tools = registry.len(),
        "Agent starting"
    );

    let model = Arc::new(ChatClient::new(config.ollama_url.clone()));
    let mut agent = AgentLoop::new(
        config.agent_config(),
        model,
        ToolInvoker::new(registry),
        &config.task,
    );

    let report = agent.run(&mut StdinInput::new()).await;

    if let Some(dir) = &config.session_dir {
        save_session(dir, config, &agent, &report);
    }

    print_summary(&report);

    ExitCode::from(exit_status(&report.outcome))
}

/// Stopping at EOF while the model waits on a reply is a normal exit
fn exit_status(outcome: &AgentOutcome) -> u8 {
    match outcome {
        AgentOutcome::Completed | AgentOutcome::AwaitingHumanInput => 0,
        AgentOutcome::Failed(_) => 1,
    }
}

fn save_session(dir: &Path, config: &AppConfig, agent: &AgentLoop, report: &AgentReport) {
    let mut session = Session::new(agent.trace_id(), &config.task, &config.model);
    session.record(agent.conversation().snapshot(), report);

    match SessionStore::new(dir).and_then(|store| store.save(&session)) {
        Ok(path) => info!(path = %path.display(), "Session saved"),
        Err(e) => error!(dir = %dir.display(), error = %e, "Failed to save session"),
    }
}

fn print_summary(report: &AgentReport) {
    let stats = format!(
        "({} model calls, {} tool calls, trace {})",
        report.iterations, report.tool_calls_made, report.trace_id
    );
    match &report.outcome {
        AgentOutcome::Completed => println!("{} {}", "Task completed".green().bold(), stats),
        AgentOutcome::AwaitingHumanInput => {
            println!("{} {}", "Stopped while waiting for a reply".yellow().bold(), stats)
        }
        AgentOutcome::Failed(reason) => {
            println!("{} {} {}", "Task failed:".red().bold(), reason, stats)
        }
    }
}
