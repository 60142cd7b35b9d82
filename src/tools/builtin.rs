//! Built-in tools: `start_vm` and `execute_code_in_vm`

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::registry::{ParamType, ParameterSpec, ToolDefinition, ToolHandler, ToolRegistry};
use super::ToolError;
use crate::grpc::VmManager;
use crate::sandbox::{CodeExecutor, ExecuteRequest};

pub const START_VM: &str = "start_vm";
pub const EXECUTE_CODE_IN_VM: &str = "execute_code_in_vm";

/// Values used when the model leaves optional execute arguments out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDefaults {
    pub code_server_addr: String,
    pub timeout_secs: u64,
}

/// Starts a VM through the VM management service
pub struct StartVmTool {
    vms: Arc<dyn VmManager>,
}

impl StartVmTool {
    pub fn new(vms: Arc<dyn VmManager>) -> Self {
        Self { vms }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            START_VM,
            "Start a virtual machine by name. Returns the VM id and its IP address.",
            vec![ParameterSpec::required(
                "vm_name",
                ParamType::String,
                "Name of the VM to start",
            )],
        )
    }
}

#[async_trait]
impl ToolHandler for StartVmTool {
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let vm_name = string_arg(args, "vm_name")?;
        let descriptor = self.vms.start_vm(vm_name).await?;
        Ok(serde_json::to_string(&descriptor)?)
    }
}

/// Runs files inside a VM through its code execution server
pub struct ExecuteCodeTool {
    executor: Arc<dyn CodeExecutor>,
    defaults: ExecutionDefaults,
}

impl ExecuteCodeTool {
    pub fn new(executor: Arc<dyn CodeExecutor>, defaults: ExecutionDefaults) -> Self {
        Self { executor, defaults }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            EXECUTE_CODE_IN_VM,
            "Execute code inside a running VM. Provide the source files, the entry point \
             and any package dependencies; returns the program output, error text and status.",
            vec![
                ParameterSpec::required(
                    "lang",
                    ParamType::String,
                    "Programming language of the code, e.g. python",
                ),
                ParameterSpec::required(
                    "files",
                    ParamType::StringMap,
                    "Mapping from file name to file contents",
                ),
                ParameterSpec::required(
                    "entry_point",
                    ParamType::String,
                    "File to run",
                ),
                ParameterSpec::required(
                    "dependencies",
                    ParamType::StringList,
                    "Packages to install before running",
                ),
                ParameterSpec::optional(
                    "timeout",
                    ParamType::Integer,
                    "Maximum execution time in seconds",
                ),
                ParameterSpec::optional(
                    "code_server_addr",
                    ParamType::String,
                    "Address of the code execution server inside the VM, e.g. http://10.0.0.5:8000",
                ),
            ],
        )
    }

    fn build_request(&self, args: &Map<String, Value>) -> Result<(String, ExecuteRequest), ToolError> {
        let files = args
            .get("files")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("files", ParamType::StringMap))?
            .iter()
            .map(|(name, body)| {
                body.as_str()
                    .map(|b| (name.clone(), b.to_string()))
                    .ok_or_else(|| invalid("files", ParamType::StringMap))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let dependencies = args
            .get("dependencies")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("dependencies", ParamType::StringList))?
            .iter()
            .map(|d| {
                d.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("dependencies", ParamType::StringList))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = match args.get("timeout") {
            None | Some(Value::Null) => self.defaults.timeout_secs,
            Some(v) => v.as_u64().ok_or_else(|| ToolError::InvalidArgument {
                name: "timeout".to_string(),
                expected: "a non-negative integer",
            })?,
        };

        let server = match args.get("code_server_addr").and_then(Value::as_str) {
            Some(addr) if !addr.trim().is_empty() => addr.to_string(),
            _ => self.defaults.code_server_addr.clone(),
        };

        let request = ExecuteRequest {
            lang: string_arg(args, "lang")?.to_string(),
            files,
            entry_point: string_arg(args, "entry_point")?.to_string(),
            dependencies,
            timeout,
        };
        Ok((server, request))
    }
}

#[async_trait]
impl ToolHandler for ExecuteCodeTool {
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let (server, request) = self.build_request(args)?;
        let output = self.executor.execute(&server, &request).await?;
        Ok(output.render())
    }
}

/// Registry holding exactly the two built-in tools
pub fn default_registry(
    vms: Arc<dyn VmManager>,
    executor: Arc<dyn CodeExecutor>,
    defaults: ExecutionDefaults,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(StartVmTool::definition(), Arc::new(StartVmTool::new(vms)))?;
    registry.register(
        ExecuteCodeTool::definition(),
        Arc::new(ExecuteCodeTool::new(executor, defaults)),
    )?;
    Ok(registry)
}

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Null) | None => Err(ToolError::MissingArguments(vec![name.to_string()])),
        Some(_) => Err(invalid(name, ParamType::String)),
    }
}

fn invalid(name: &str, kind: ParamType) -> ToolError {
    ToolError::InvalidArgument {
        name: name.to_string(),
        expected: kind.describe(),
    }
}
