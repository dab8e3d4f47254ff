//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: take notes,
//! crunch numbers, look things up. Each tool declares a JSON Schema for
//! its arguments; the registry compiles it once at registration and
//! refuses to run the tool with arguments that do not conform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Rough category of a tool, shown to the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Memory,
    Analysis,
    Information,
    Planning,
    #[default]
    Integration,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Memory => "memory",
            ToolKind::Analysis => "analysis",
            ToolKind::Information => "information",
            ToolKind::Planning => "planning",
            ToolKind::Integration => "integration",
        }
    }
}

/// A tool description sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub kind: ToolKind,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Human-readable output
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// A failed execution is reported as `Err`; the registry wraps whatever
/// comes back into [`ToolError::Execution`] with the tool's name attached.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "note_take", "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the reasoning service).
    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind {
        ToolKind::Integration
    }

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            kind: self.kind(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    tool: Box<dyn Tool>,
    schema: serde_json::Value,
    validator: jsonschema::Validator,
}

/// A registry of available tools, keyed by unique name.
///
/// Backed by a `BTreeMap` so the catalog comes out in name order every time.
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Default upper bound on a single tool execution.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the execution timeout applied to every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Fails if the name is taken or the schema does not compile.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        let schema = tool.parameters_schema();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| ToolError::InvalidSchema {
                tool: name.clone(),
                reason: e.to_string(),
            })?;

        debug!(tool = %name, "Registered tool");
        self.tools.insert(
            name,
            RegisteredTool {
                tool,
                schema,
                validator,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.tool.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool definitions in name order.
    pub fn catalog(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.tool.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Turn numbers and booleans into strings where `name`'s schema declares
    /// a string. Markup arguments carry no types, so `<text>42</text>`
    /// arrives as the number 42. Unknown tools get their arguments back.
    pub fn conform(&self, name: &str, arguments: serde_json::Value) -> serde_json::Value {
        match self.tools.get(name) {
            Some(entry) => conform_to_schema(&entry.schema, arguments),
            None => arguments,
        }
    }

    /// Check that `name` exists and `arguments` satisfy its schema.
    pub fn validate(&self, name: &str, arguments: &serde_json::Value) -> Result<(), ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let errors: Vec<String> = entry
            .validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToolError::SchemaValidation {
                tool: name.to_string(),
                errors,
            })
        }
    }

    /// Validate, then execute. The executor never sees invalid arguments.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let arguments = self.conform(name, arguments);
        self.validate(name, &arguments)?;
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match tokio::time::timeout(self.timeout, entry.tool.execute(arguments)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(ToolError::Execution { tool, cause })) => {
                warn!(tool = %tool, cause = %cause, "Tool execution failed");
                Err(ToolError::Execution { tool, cause })
            }
            Ok(Err(other)) => {
                warn!(tool = %name, error = %other, "Tool execution failed");
                Err(ToolError::Execution {
                    tool: name.to_string(),
                    cause: other.to_string(),
                })
            }
            Err(_) => {
                warn!(tool = %name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                Err(ToolError::Timeout {
                    tool: name.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn conform_to_schema(schema: &serde_json::Value, arguments: serde_json::Value) -> serde_json::Value {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return arguments;
    };
    match arguments {
        serde_json::Value::Object(mut map) => {
            for (key, value) in map.iter_mut() {
                if let Some(property) = properties.get(key) {
                    conform_value(property, value);
                }
            }
            serde_json::Value::Object(map)
        }
        other => other,
    }
}

fn conform_value(property: &serde_json::Value, value: &mut serde_json::Value) {
    use serde_json::Value;

    match property.get("type").and_then(Value::as_str) {
        Some("string") => {
            if matches!(value, Value::Number(_) | Value::Bool(_)) {
                *value = Value::String(value.to_string());
            }
        }
        Some("array") => {
            if let (Some(items), Value::Array(values)) = (property.get("items"), value) {
                for item in values {
                    conform_value(items, item);
                }
            }
        }
        _ => {}
    }
}
