//! Tool types — named, schema-bearing executable units.
//!
//! A [`Tool`] is a tagged variant: [`FunctionTool`] executes locally through
//! a [`ToolHandler`], while [`HostedTool`] is a name plus a type marker the
//! provider recognizes and executes on its side. Tool and output shapes are
//! validated explicitly at agent-construction time rather than coerced at
//! call time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Async handler behind a [`FunctionTool`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with already-parsed JSON arguments.
    async fn invoke(&self, args: Value) -> Result<Value>;
}

type BoxedToolFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Adapter wrapping a plain async closure as a [`ToolHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> BoxedToolFuture + Send + Sync,
{
    async fn invoke(&self, args: Value) -> Result<Value> {
        (self.0)(args).await
    }
}

/// A locally executable tool.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Arc<dyn ToolHandler>,
}

impl FunctionTool {
    /// Create a function tool from a [`ToolHandler`] implementation.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }

    /// Create a function tool from an async closure.
    ///
    /// ```rust,ignore
    /// let weather = FunctionTool::from_fn(
    ///     "weather",
    ///     "Look up current weather for a city.",
    ///     serde_json::json!({
    ///         "type": "object",
    ///         "properties": {"city": {"type": "string"}},
    ///         "required": ["city"]
    ///     }),
    ///     |args| async move { Ok(serde_json::json!("sunny 22")) },
    /// );
    /// ```
    #[must_use]
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed = move |args: Value| -> BoxedToolFuture { Box::pin(f(args)) };
        Self::new(name, description, parameters, FnHandler(boxed))
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description shown to the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The argument JSON Schema.
    #[must_use]
    pub const fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Invoke the handler.
    pub async fn invoke(&self, args: Value) -> Result<Value> {
        self.handler.invoke(args).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A provider-executed tool, never invoked locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedTool {
    name: String,
    kind: String,
}

impl HostedTool {
    /// Create a hosted tool with a provider-recognized type marker
    /// (e.g., `"web_search"`).
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider type marker.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// A tool available to an agent.
#[derive(Debug, Clone)]
pub enum Tool {
    /// A locally executable function tool.
    Function(FunctionTool),
    /// A provider-hosted tool.
    Hosted(HostedTool),
}

impl Tool {
    /// The tool's name, regardless of variant.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function(t) => t.name(),
            Self::Hosted(t) => t.name(),
        }
    }

    /// The description shown to the model; hosted tools have none.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Function(t) => t.description(),
            Self::Hosted(_) => "",
        }
    }

    /// Returns the function tool, if this is one.
    #[must_use]
    pub const fn as_function(&self) -> Option<&FunctionTool> {
        match self {
            Self::Function(t) => Some(t),
            Self::Hosted(_) => None,
        }
    }

    /// Build the provider-facing definition for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        match self {
            Self::Function(t) => ToolDefinition::function(t.name(), t.description(), t.parameters().clone()),
            Self::Hosted(t) => ToolDefinition::hosted(t.name(), t.kind()),
        }
    }
}

impl From<FunctionTool> for Tool {
    fn from(tool: FunctionTool) -> Self {
        Self::Function(tool)
    }
}

impl From<HostedTool> for Tool {
    fn from(tool: HostedTool) -> Self {
        Self::Hosted(tool)
    }
}

/// Function fields of a [`ToolDefinition`].
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    /// Function name.
    pub name: String,
    /// Function description.
    pub description: String,
    /// Argument JSON Schema.
    pub parameters: Value,
}

/// Provider-facing tool definition.
///
/// Serializes to the Chat Completions `tools` entry shape:
/// `{"type": "function", "function": {...}}` for function tools and
/// `{"type": "<kind>"}` for hosted tools.
#[derive(Debug, Clone)]
pub enum ToolDefinition {
    /// A function tool definition.
    Function(FunctionSpec),
    /// A hosted tool definition: `(name, provider type marker)`.
    Hosted(String, String),
}

impl ToolDefinition {
    /// Create a function definition.
    #[must_use]
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self::Function(FunctionSpec {
            name: name.into(),
            description: description.into(),
            parameters,
        })
    }

    /// Create a hosted definition.
    #[must_use]
    pub fn hosted(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Hosted(name.into(), kind.into())
    }

    /// The definition's tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function(spec) => &spec.name,
            Self::Hosted(name, _) => name,
        }
    }
}

impl Serialize for ToolDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Function(spec) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "function")?;
                map.serialize_entry("function", spec)?;
                map.end()
            }
            Self::Hosted(_, kind) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", kind)?;
                map.end()
            }
        }
    }
}

/// Execute a function tool by name against a tool list.
///
/// This is the resolution primitive shared by
/// [`Agent::execute_tool`](crate::agent::Agent::execute_tool) and the
/// dispatcher: exact name match, [`Error::ToolNotFound`] otherwise. Hosted
/// tools are not locally executable and also report as not found.
pub(crate) async fn invoke_by_name(tools: &[Tool], name: &str, args: Value) -> Result<Value> {
    let tool = tools
        .iter()
        .find_map(|t| t.as_function().filter(|f| f.name() == name))
        .ok_or_else(|| Error::ToolNotFound(name.to_owned()))?;
    tool.invoke(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool() -> Tool {
        FunctionTool::from_fn(
            "echo",
            "Echo back the message.",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            |args| async move { Ok(args["message"].clone()) },
        )
        .into()
    }

    #[tokio::test]
    async fn invoke_by_exact_name() {
        let tools = vec![echo_tool()];
        let result = invoke_by_name(&tools, "echo", json!({"message": "hi"}))
            .await
            .expect("echo invokes");
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn missing_tool_reports_not_found() {
        let tools = vec![echo_tool()];
        let err = invoke_by_name(&tools, "missing", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn hosted_tools_are_not_locally_invocable() {
        let tools = vec![Tool::Hosted(HostedTool::new("search", "web_search"))];
        let err = invoke_by_name(&tools, "search", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[test]
    fn function_definition_wire_shape() {
        let def = echo_tool().definition();
        let json = serde_json::to_value(&def).expect("serializable");
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "echo");
        assert_eq!(json["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn hosted_definition_wire_shape() {
        let def = ToolDefinition::hosted("search", "web_search");
        let json = serde_json::to_value(&def).expect("serializable");
        assert_eq!(json, json!({"type": "web_search"}));
    }
}
