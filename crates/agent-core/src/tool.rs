//! Tool System
//!
//! Tools are named, described, schema-declared units of executable behavior.
//! They are registered on an agent at construction time and dispatched by
//! name from the agent loop.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};

/// Named tool arguments as sent by the model
pub type ToolInput = Map<String, Value>;

/// Value returned by a tool
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    /// Raw text, passed through verbatim
    Text(String),

    /// A number, boolean or null
    Scalar(Value),

    /// A JSON object
    Structured(Map<String, Value>),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The `{"error": ...}` payload fed back to the model on failure
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".into(), Value::String(message.into()));
        Self::Structured(map)
    }

    /// Convert any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::from(serde_json::to_value(value)?))
    }

    /// Serialize for a tool-result message
    pub fn to_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Scalar(value) => value.to_string(),
            Self::Structured(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| format!("{map:?}"))
            }
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            Value::String(text) => Self::Text(text),
            array @ Value::Array(_) => Self::Text(array.to_string()),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<bool> for ToolOutput {
    fn from(value: bool) -> Self {
        Self::Scalar(Value::Bool(value))
    }
}

impl From<i64> for ToolOutput {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::from(value))
    }
}

impl From<f64> for ToolOutput {
    fn from(value: f64) -> Self {
        Self::Scalar(Value::from(value))
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    pub required: bool,

    /// Default value if not provided
    pub default: Option<Value>,

    /// Enum of allowed values
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "string", description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, "integer", description)
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn to_property(&self) -> Value {
        let mut property = json!({
            "type": self.param_type,
            "description": self.description,
        });
        if let Some(values) = &self.enum_values {
            property["enum"] = Value::Array(values.clone());
        }
        if let Some(default) = &self.default {
            property["default"] = default.clone();
        }
        property
    }
}

/// Object-typed input specification of a tool
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSchema {
    pub parameters: Vec<ParameterSchema>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, parameter: ParameterSchema) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON-Schema rendering: `{"type": "object", "properties", "required"}`
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Provider-facing tool descriptor
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Input specification
    pub input_schema: InputSchema,
}

impl ToolSchema {
    /// The `{name, description, input_schema}` triple
    pub fn as_dict(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema.to_json(),
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for model tool calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with the given named arguments
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;

    /// Tool name
    fn name(&self) -> String {
        self.schema().name
    }

    /// Validate arguments before execution
    fn validate(&self, input: &ToolInput) -> Result<()> {
        let schema = self.schema();

        for param in &schema.input_schema.parameters {
            match input.get(&param.name) {
                None if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) => {
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            return Err(AgentError::ToolValidation(format!(
                                "Parameter {} must be one of {}",
                                param.name,
                                Value::Array(allowed.clone())
                            )));
                        }
                    }
                }
                None => {}
            }
        }

        Ok(())
    }
}

type Handler = Arc<dyn Fn(ToolInput) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync>;

/// Tool backed by a closure and an explicit schema
#[derive(Clone)]
pub struct FunctionTool {
    schema: ToolSchema,
    handler: Handler,
}

impl FunctionTool {
    /// Wrap an async function
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        let name = name.into();
        let description = description.into();
        let description = if description.is_empty() {
            format!("Execute {name} function")
        } else {
            description
        };

        Self {
            schema: ToolSchema {
                name,
                description,
                input_schema,
            },
            handler: Arc::new(move |input| handler(input).boxed()),
        }
    }

    /// Wrap a plain function
    pub fn sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(&ToolInput) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self::new(name, description, input_schema, move |input| {
            futures::future::ready(handler(&input))
        })
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.schema.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        (self.handler)(input.clone()).await
    }
}

/// Registry for available tools
///
/// Keyed by name, kept in registration order. Registering a second tool
/// under an existing name replaces the first in place.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if let Some(&slot) = self.index.get(&name) {
            self.tools[slot] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.index
            .get(name)
            .map(|&slot| Arc::clone(&self.tools[slot]))
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// All tool descriptors, in registration order
    pub fn get_all_tools(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Look up, validate and execute a tool
    pub async fn execute_tool(&self, name: &str, input: &ToolInput) -> Result<ToolOutput> {
        let tool = self.get_tool(name)?;
        tool.validate(input)?;
        tool.execute(input).await
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
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

/// A registry that can be shared between agents.
///
/// Cloning shares the same underlying tool set. Tools are cloned out of the
/// lock before execution, so no lock is held across a tool call.
#[derive(Clone, Default)]
pub struct SharedToolRegistry {
    inner: Arc<RwLock<ToolRegistry>>,
}

impl SharedToolRegistry {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&ToolRegistry) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&self, tool: Arc<dyn Tool>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_arc(tool);
    }

    pub fn get_tool(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.read(|registry| registry.get_tool(name))
    }

    pub fn get_all_tools(&self) -> Vec<ToolSchema> {
        self.read(ToolRegistry::get_all_tools)
    }

    pub async fn execute_tool(&self, name: &str, input: &ToolInput) -> Result<ToolOutput> {
        let tool = self.get_tool(name)?;
        tool.validate(input)?;
        tool.execute(input).await
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.read(|registry| registry.has_tool(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.read(ToolRegistry::names)
    }

    pub fn len(&self) -> usize {
        self.read(ToolRegistry::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(ToolRegistry::is_empty)
    }
}
