//! Tool catalog
//!
//! Each entry pairs a `ToolDefinition` (what the model sees) with a handler
//! (what runs). Lookup is by unique name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::ToolError;

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    /// Object whose values are all strings
    StringMap,
    /// Array of strings
    StringList,
}

impl ParamType {
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringMap => json!({
                "type": "object",
                "additionalProperties": {"type": "string"}
            }),
            ParamType::StringList => json!({
                "type": "array",
                "items": {"type": "string"}
            }),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringMap => value
                .as_object()
                .map(|m| m.values().all(Value::is_string))
                .unwrap_or(false),
            ParamType::StringList => value
                .as_array()
                .map(|a| a.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            ParamType::String => "a string",
            ParamType::Integer => "an integer",
            ParamType::Boolean => "a boolean",
            ParamType::StringMap => "an object of string values",
            ParamType::StringList => "an array of strings",
        }
    }
}

/// One declared argument
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Description of a callable tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// JSON Schema for the `parameters` field of a function tool
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut schema = param.kind.schema();
            schema["description"] = Value::String(param.description.clone());
            properties.insert(param.name.clone(), schema);
        }
        let required: Vec<&str> = self.required_names().collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// Check presence of required arguments, then the type of every declared one.
    /// Undeclared keys are ignored.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        let missing: Vec<String> = self
            .required_names()
            .filter(|name| matches!(args.get(*name), None | Some(Value::Null)))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingArguments(missing));
        }

        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) => {}
                Some(value) if param.kind.matches(value) => {}
                Some(_) => {
                    return Err(ToolError::InvalidArgument {
                        name: param.name.clone(),
                        expected: param.kind.describe(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Runs a tool once its arguments have been validated
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError>;
}

/// A definition bound to its handler
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

/// Name-keyed tool catalog, iterated in registration order
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        if self.index.contains_key(&definition.name) {
            return Err(ToolError::DuplicateTool(definition.name));
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            handler,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
