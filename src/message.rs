//! Message types for agent-model communication.
//!
//! The canonical conversation form follows the Chat Completions API: roles
//! are lowercase strings, assistant messages may carry tool calls with JSON
//! text arguments, and tool-result messages correlate back to an assistant
//! tool call via `tool_call_id`.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing instructions.
    System,
    /// User message.
    User,
    /// Assistant (model) message.
    Assistant,
    /// Tool result message.
    Tool,
}

impl Role {
    /// Get the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Function payload of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Name of the function to call.
    pub name: String,
    /// Arguments as raw JSON text, exactly as emitted by the provider.
    #[serde(default)]
    pub arguments: String,
}

/// A tool call emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for the tool call.
    pub id: String,
    /// Type of the call (always `"function"` for locally dispatched tools).
    #[serde(rename = "type", default = "ToolCall::default_kind")]
    pub kind: String,
    /// The function to call.
    pub function: ToolCallFunction,
}

impl ToolCall {
    fn default_kind() -> String {
        "function".to_owned()
    }

    /// Create a new function tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: Self::default_kind(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Name of the function being called.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Parse the JSON arguments into a value.
    ///
    /// An empty arguments string parses as an empty object, which is how
    /// providers encode zero-argument calls.
    pub fn parse_arguments(&self) -> serde_json::Result<serde_json::Value> {
        if self.function.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.function.arguments)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender.
    pub role: Role,

    /// Text content. May be empty on assistant messages that only carry
    /// tool calls.
    #[serde(default)]
    pub content: String,

    /// Tool calls made by the model (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Correlating tool call id (tool messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool result message correlated to a prior tool call.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Check whether this message carries at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// The tool calls, empty when none are present.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = Message::tool("call_1", "ok");
        let json = serde_json::to_value(&msg).expect("serializable");
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
    }

    #[test]
    fn assistant_with_tool_calls_may_have_empty_content() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "weather", r#"{"city":"Paris"}"#)],
        );
        assert!(msg.has_tool_calls());
        assert!(msg.content.is_empty());
        assert_eq!(msg.tool_calls()[0].name(), "weather");
    }

    #[test]
    fn parse_arguments_handles_empty_string() {
        let call = ToolCall::new("call_1", "noop", "");
        let args = call.parse_arguments().expect("empty arguments parse");
        assert!(args.as_object().is_some_and(serde_json::Map::is_empty));
    }

    #[test]
    fn parse_arguments_rejects_garbage() {
        let call = ToolCall::new("call_1", "weather", "{not json");
        assert!(call.parse_arguments().is_err());
    }

    #[test]
    fn deserializes_wire_form() {
        let msg: Message = serde_json::from_str(
            r#"{
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"id": "call_abc", "type": "function",
                     "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}}
                ]
            }"#,
        )
        .expect("valid wire message");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls()[0].id, "call_abc");
    }
}
