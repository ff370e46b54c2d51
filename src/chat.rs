//! Chat types and the [`ModelProvider`] capability.
//!
//! This module provides:
//! - [`ChatRequest`]: request parameters for chat completions
//! - [`ChatResponse`]: a complete response
//! - [`ChatChunk`]: the wire-format streaming delta
//! - [`ModelProvider`]: the trait consumed by the runner for LLM calls
//!
//! # OpenAI API Alignment
//!
//! Requests and chunks align with the Chat Completions API. Provider
//! implementations coerce their own wire formats into these types at the
//! boundary so the rest of the runtime sees a single canonical form.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;
use crate::usage::Usage;

/// A boxed stream of wire-format chunks from a streaming completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// A chat completion request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., `"gpt-4o"`).
    pub model: String,

    /// Conversation messages.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Frequency penalty (-2.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// End-user identifier for tracking and abuse detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Tool definitions available to the model. Omitted entirely when the
    /// agent exposes no tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Whether to stream the response.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,

    /// Response format for structured outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Create a request for the given model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Create a request with messages.
    #[must_use]
    pub fn with_messages(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    /// Add a user message.
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Add a system message.
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Set the tool definitions.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the response format.
    #[must_use]
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Enable streaming.
    #[must_use]
    pub const fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set nucleus sampling.
    #[must_use]
    pub const fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the completion token cap.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response format specification for structured outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text response.
    Text,
    /// Free-form JSON object response.
    JsonObject,
    /// JSON constrained by a schema (structured outputs).
    JsonSchema {
        /// The schema envelope.
        json_schema: JsonSchemaSpec,
    },
}

impl ResponseFormat {
    /// Create a strict JSON schema format.
    #[must_use]
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: name.into(),
                schema,
                strict: Some(true),
            },
        }
    }
}

/// JSON schema envelope for structured outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    /// Schema name.
    pub name: String,
    /// JSON Schema definition.
    pub schema: Value,
    /// Whether to enforce strict validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Generate a JSON Schema from a Rust type via [`schemars`].
///
/// Returns `(name, schema)` with the `$schema` meta field stripped, since
/// LLM APIs do not accept it.
#[must_use]
pub fn generate_json_schema<T: schemars::JsonSchema>() -> (String, Value) {
    let root = schemars::schema_for!(T);
    let mut schema_value = serde_json::to_value(&root).unwrap_or_default();

    if let Value::Object(map) = &mut schema_value {
        map.remove("$schema");
    }

    let name = <T as schemars::JsonSchema>::schema_name();
    (name.into_owned(), schema_value)
}

/// A complete chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated assistant message.
    pub message: Message,

    /// Token usage, when the provider reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Model identifier used for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Unique completion id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Provider error surfaced inside an otherwise well-formed response
    /// body. A set error field makes the turn terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// Create a response wrapping an assistant message.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            model: None,
            id: None,
            error: None,
        }
    }

    /// Create a response from plain text content.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(Message::assistant(content))
    }

    /// Attach usage statistics.
    #[must_use]
    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach the completion id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a provider error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// The assistant text content.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.message.content
    }

    /// The tool calls, empty when none are present.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls()
    }
}

// ---------------------------------------------------------------------------
// Wire-format streaming chunks
// ---------------------------------------------------------------------------

/// One streamed chunk of a chat completion, in wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Chunk/completion id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Response choices; the runtime only consumes the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Usage, present on the final chunk when the provider includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// The first choice's delta, if any.
    #[must_use]
    pub fn delta(&self) -> Option<&ChunkDelta> {
        self.choices.first().map(|c| &c.delta)
    }

    /// Convenience constructor for a text-content chunk.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: Some(content.into()),
                    ..ChunkDelta::default()
                },
                finish_reason: None,
            }],
            ..Self::default()
        }
    }

    /// Convenience constructor for a tool-call delta chunk.
    #[must_use]
    pub fn tool_call_delta(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    tool_calls: Some(vec![ToolCallDelta {
                        index,
                        id: id.map(str::to_owned),
                        function: Some(ToolCallFunctionDelta {
                            name: name.map(str::to_owned),
                            arguments: arguments.map(str::to_owned),
                        }),
                    }]),
                    ..ChunkDelta::default()
                },
                finish_reason: None,
            }],
            ..Self::default()
        }
    }

    /// Convenience constructor for a usage-only chunk.
    #[must_use]
    pub fn with_usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Self::default()
        }
    }
}

/// A choice within a streamed chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,
    /// The incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Finish reason, set on the closing chunk of a choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental content within a chunk choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present on the opening chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text content fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Refusal fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
    /// Tool-call fragments, keyed by `index`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool-call fragment within a chunk delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index identifying which tool call this fragment belongs to.
    #[serde(default)]
    pub index: usize,
    /// Tool call id fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name/arguments fragments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<ToolCallFunctionDelta>,
}

/// Function fragments within a tool-call delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallFunctionDelta {
    /// Function name fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments JSON fragment; concatenates across chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

// ---------------------------------------------------------------------------
// ModelProvider
// ---------------------------------------------------------------------------

/// The LLM capability consumed by the runner.
///
/// Implementations own transport concerns (HTTP, retries, timeouts) and
/// surface failures as [`Error::Provider`](crate::Error::Provider).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send a chat completion request and receive a complete response.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Send a chat completion request and receive a stream of wire chunks.
    ///
    /// The default implementation reports streaming as unsupported;
    /// providers override it when they can stream.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let _ = request;
        Err(crate::Error::provider(format!(
            "provider '{}' does not support streaming",
            self.provider_name()
        )))
    }

    /// Whether this provider supports the Responses-API prompt path.
    fn supports_prompts(&self) -> bool {
        false
    }

    /// Name of this provider, used in error messages and logging.
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_empty_optional_fields() {
        let request = ChatRequest::new("gpt-4o").user("hi");
        let json = serde_json::to_value(&request).expect("serializable");
        let obj = json.as_object().expect("object");
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("stream"));
        assert!(!obj.contains_key("response_format"));
    }

    #[test]
    fn response_format_wire_shape() {
        let format = ResponseFormat::json_schema("weather", serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&format).expect("serializable");
        assert_eq!(json["type"], "json_schema");
        assert_eq!(json["json_schema"]["name"], "weather");
        assert_eq!(json["json_schema"]["strict"], true);
    }

    #[test]
    fn chunk_deserializes_wire_form() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
            }"#,
        )
        .expect("valid chunk");
        assert_eq!(chunk.delta().and_then(|d| d.content.as_deref()), Some("Hel"));
    }

    #[test]
    fn generated_schema_strips_meta_field() {
        #[derive(schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Forecast {
            city: String,
            temperature_c: i32,
        }

        let (name, schema) = generate_json_schema::<Forecast>();
        assert_eq!(name, "Forecast");
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
    }
}
