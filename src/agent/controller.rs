//! Agent loop - the conversation/tool-dispatch state machine
//!
//! ```text
//! AwaitingModel ──assistant turn──► DispatchingTools ──all results appended──► AwaitingModel
//!      │
//!      ├── no tool calls, final answer ──► Completed
//!      ├── no tool calls, question ─────► AwaitingHumanInput ──reply──► AwaitingModel
//!      └── model error ─────────────────► Failed
//! ```
//!
//! Everything runs sequentially: one model request at a time, tool calls of a
//! batch one after another in the order the model listed them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conversation::{
    evaluate_turn, AgentOutcome, Conversation, Role, Turn, TurnDisposition,
};
use super::model::ModelClient;
use crate::console;
use crate::tools::{ToolDefinition, ToolInvoker};

/// Settings for one agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model to use (e.g., "qwen3")
    pub model: String,
    /// System prompt seeding the transcript
    pub system_prompt: String,
    /// Maximum number of model calls before giving up
    pub max_iterations: usize,
    /// Echo every turn to stdout
    pub echo: bool,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_iterations: 25,
            echo: true,
        }
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    DispatchingTools,
    AwaitingHumanInput,
    Completed,
    Failed(String),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Completed | LoopState::Failed(_))
    }
}

/// Source of human replies when the model asks a question
#[async_trait]
pub trait HumanInput: Send {
    /// `Ok(None)` means no more input (EOF)
    async fn read_reply(&mut self) -> std::io::Result<Option<String>>;
}

/// Reads replies line by line from stdin, skipping blank lines
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanInput for StdinInput {
    async fn read_reply(&mut self) -> std::io::Result<Option<String>> {
        loop {
            console::print_input_prompt();
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }
}

/// Summary of an agent run
#[derive(Debug, Clone)]
pub struct AgentReport {
    pub outcome: AgentOutcome,
    /// Text of the last assistant turn, if any
    pub final_response: Option<String>,
    /// Number of model calls made
    pub iterations: usize,
    /// Number of tool calls dispatched
    pub tool_calls_made: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// Drives the transcript through model calls and tool dispatch
pub struct AgentLoop {
    config: AgentConfig,
    model: Arc<dyn ModelClient>,
    invoker: ToolInvoker,
    tools: Vec<ToolDefinition>,
    conversation: Conversation,
    state: LoopState,
    iterations: usize,
    tool_calls_made: usize,
    trace_id: String,
}

impl AgentLoop {
    /// Seed a transcript with the system prompt and `task`
    pub fn new(
        config: AgentConfig,
        model: Arc<dyn ModelClient>,
        invoker: ToolInvoker,
        task: &str,
    ) -> Self {
        let tools = invoker.registry().definitions();
        let conversation = Conversation::seeded(config.system_prompt.clone(), task);
        Self {
            config,
            model,
            invoker,
            tools,
            conversation,
            state: LoopState::AwaitingModel,
            iterations: 0,
            tool_calls_made: 0,
            trace_id: Uuid::now_v7().to_string(),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Run until the loop completes, fails, or waits on a human that has no more input
    pub async fn run(&mut self, human: &mut dyn HumanInput) -> AgentReport {
        let root_span = info_span!(
            "agent_task",
            trace_id = %self.trace_id,
            model = %self.config.model,
            otel.name = "agent_task"
        );

        async {
            info!(trace_id = %self.trace_id, "Starting agent task");
            if self.config.echo {
                for turn in self.conversation.snapshot() {
                    console::print_turn(turn);
                }
            }

            let outcome = loop {
                if let Some(outcome) = self.step(human).await {
                    break outcome;
                }
            };

            match &outcome {
                AgentOutcome::Completed => info!(
                    iterations = self.iterations,
                    tool_calls = self.tool_calls_made,
                    "Agent task completed"
                ),
                AgentOutcome::AwaitingHumanInput => {
                    info!("No more human input, stopping while awaiting a reply")
                }
                AgentOutcome::Failed(reason) => error!(reason = %reason, "Agent task failed"),
            }

            AgentReport {
                outcome,
                final_response: self.final_response(),
                iterations: self.iterations,
                tool_calls_made: self.tool_calls_made,
                trace_id: self.trace_id.clone(),
            }
        }
        .instrument(root_span)
        .await
    }

    /// Perform one transition. Returns the outcome once the run is over.
    pub async fn step(&mut self, human: &mut dyn HumanInput) -> Option<AgentOutcome> {
        match self.state {
            LoopState::AwaitingModel => self.query_model().await,
            LoopState::DispatchingTools => self.dispatch_tools().await,
            LoopState::AwaitingHumanInput => match human.read_reply().await {
                Ok(Some(reply)) => {
                    self.state = LoopState::AwaitingModel;
                    self.push(Turn::user(reply));
                }
                Ok(None) => return Some(AgentOutcome::AwaitingHumanInput),
                Err(e) => self.fail(format!("failed to read human input: {}", e)),
            },
            LoopState::Completed | LoopState::Failed(_) => {}
        }
        self.terminal_outcome()
    }

    fn terminal_outcome(&self) -> Option<AgentOutcome> {
        match &self.state {
            LoopState::Completed => Some(AgentOutcome::Completed),
            LoopState::Failed(reason) => Some(AgentOutcome::Failed(reason.clone())),
            _ => None,
        }
    }

    async fn query_model(&mut self) {
        if self.iterations >= self.config.max_iterations {
            warn!(iterations = self.iterations, "Max iterations reached");
            self.fail(format!(
                "maximum iterations ({}) reached",
                self.config.max_iterations
            ));
            return;
        }
        self.iterations += 1;

        let llm_span = info_span!(
            "llm_call",
            trace_id = %self.trace_id,
            iteration = self.iterations,
            model = %self.config.model,
            otel.name = "llm_call"
        );

        let call_start = std::time::Instant::now();
        let response = self
            .model
            .complete(&self.config.model, self.conversation.snapshot(), &self.tools)
            .instrument(llm_span)
            .await;
        let call_duration_ms = call_start.elapsed().as_secs_f64() * 1000.0;

        let turn = match response {
            Ok(turn) => turn,
            Err(e) => {
                error!(iteration = self.iterations, error = %e, "Model request failed");
                self.fail(format!("model request failed: {}", e));
                return;
            }
        };
        info!(
            iteration = self.iterations,
            duration_ms = call_duration_ms,
            tool_calls = turn.tool_calls.len(),
            "LLM call completed"
        );

        let disposition = evaluate_turn(&turn);
        self.push(turn);
        if self.state.is_terminal() {
            return;
        }

        self.state = match disposition {
            TurnDisposition::DispatchTools => LoopState::DispatchingTools,
            TurnDisposition::Completed => LoopState::Completed,
            TurnDisposition::AwaitingHumanInput => LoopState::AwaitingHumanInput,
        };
    }

    async fn dispatch_tools(&mut self) {
        let calls = match self.conversation.last() {
            Some(turn) if turn.has_tool_calls() => turn.tool_calls.clone(),
            _ => {
                self.fail("no tool calls to dispatch".to_string());
                return;
            }
        };

        for call in &calls {
            let tool_span = info_span!(
                "tool_call",
                trace_id = %self.trace_id,
                tool = %call.tool_name,
                call_id = %call.id,
                otel.name = "tool_call"
            );
            let result = self.invoker.invoke(call).instrument(tool_span).await;
            self.tool_calls_made += 1;

            self.push(result.into_turn());
            if self.state.is_terminal() {
                return;
            }
        }

        self.state = LoopState::AwaitingModel;
    }

    /// Append to the transcript; an invariant violation fails the run
    fn push(&mut self, turn: Turn) {
        if self.config.echo {
            console::print_turn(&turn);
        }
        if let Err(e) = self.conversation.append(turn) {
            error!(error = %e, "Transcript invariant violated");
            self.fail(format!("transcript error: {}", e));
        }
    }

    fn fail(&mut self, reason: String) {
        self.state = LoopState::Failed(reason);
    }

    fn final_response(&self) -> Option<String> {
        self.conversation
            .snapshot()
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .and_then(|t| t.content.clone())
    }
}
