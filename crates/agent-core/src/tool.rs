//! Tool System
//!
//! Name-keyed capability table consulted by the orchestrator. Dispatch never
//! fails: unknown names, validation errors, tool errors and panics all come
//! back as text so every `tool_use` gets its `tool_result`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Arguments of a tool invocation
pub type ToolArguments = Map<String, Value>;

/// Appended to tool output cut at the character ceiling
pub const TRUNCATION_MARKER: &str = "\n\n[... output truncated]";

const PREVIEW_CHARS: usize = 120;

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition advertised to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Catalog entry in the `{name, description, input_schema}` wire shape
    pub fn to_wire(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// Tool trait - implement to add new capabilities
///
/// Implementations time-box their own I/O and cap their own output.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for the catalog
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: &ToolArguments) -> Result<String>;

    /// Short argument summary for display, e.g. the command or the path
    fn preview(&self, _arguments: &ToolArguments) -> Option<String> {
        None
    }

    /// Validate arguments before execution (optional)
    fn validate(&self, arguments: &ToolArguments) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Fetch a required string argument
pub fn required_str<'a>(arguments: &'a ToolArguments, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ToolValidation(format!("'{key}' must be a string")))
}

/// Text result of one dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Outcome of looking a tool name up
pub enum Capability {
    Registered(Arc<dyn Tool>),
    Unsupported(String),
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a shared tool; a later registration replaces an earlier one
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Capability {
        match self.get(name) {
            Some(tool) => Capability::Registered(tool),
            None => Capability::Unsupported(name.to_string()),
        }
    }

    /// Execute a tool call, converting every failure into text
    pub async fn dispatch(&self, name: &str, arguments: &ToolArguments) -> ToolOutput {
        let tool = match self.resolve(name) {
            Capability::Registered(tool) => tool,
            Capability::Unsupported(name) => {
                tracing::warn!(tool = %name, "Model requested an unknown tool");
                return ToolOutput::failure(format!("Error: unknown tool '{name}'"));
            }
        };

        if let Err(e) = tool.validate(arguments) {
            return ToolOutput::failure(format!("Error: {e}"));
        }

        let arguments = arguments.clone();
        let task = tokio::spawn(async move { tool.execute(&arguments).await });

        match task.await {
            Ok(Ok(output)) => ToolOutput::success(output),
            Ok(Err(e)) => {
                tracing::debug!(tool = %name, error = %e, "Tool failed");
                ToolOutput::failure(format!("Error: {e}"))
            }
            Err(e) => {
                tracing::error!(tool = %name, error = %e, "Tool task aborted");
                ToolOutput::failure(format!("Error: tool '{name}' crashed"))
            }
        }
    }

    /// Short display summary of an invocation; falls back to the tool name
    pub fn preview(&self, name: &str, arguments: &ToolArguments) -> String {
        let preview = self
            .get(name)
            .and_then(|tool| tool.preview(arguments))
            .unwrap_or_else(|| name.to_string());

        if preview.chars().count() > PREVIEW_CHARS {
            let cut: String = preview.chars().take(PREVIEW_CHARS).collect();
            format!("{cut}...")
        } else {
            preview
        }
    }

    /// Schemas in registration order
    pub fn catalog(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.schema())
            .collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
pub fn truncate_output(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut cut = text;
            cut.truncate(byte_idx);
            cut.push_str(TRUNCATION_MARKER);
            (cut, true)
        }
        None => (text, false),
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time".into(),
            parameters: vec![ParameterSchema::optional(
                "format",
                "string",
                "Output format: 'iso', 'human', or 'unix'",
            )
            .with_default(json!("human"))
            .with_enum(vec![json!("iso"), json!("human"), json!("unix")])],
        }
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String> {
        let format = arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("human");

        let now = chrono::Utc::now();

        Ok(match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        })
    }
}
