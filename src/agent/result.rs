//! Run inputs, configuration, results, and streamed events.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::context::StopToken;
use crate::error::Error;
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::hooks::SharedRunHooks;
use crate::message::Message;
use crate::stream::StreamEvent;
use crate::usage::Usage;

/// Default workflow name for new traces.
pub const DEFAULT_WORKFLOW_NAME: &str = "Agent workflow";

/// Input to a run: a plain string coerced to a single user message, or a
/// conversation prefix.
#[derive(Debug, Clone)]
pub enum UserInput {
    /// A single user message.
    Text(String),
    /// An existing conversation prefix.
    Messages(Vec<Message>),
}

impl UserInput {
    /// Normalize to a conversation.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for UserInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for UserInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

/// Run-level configuration, read-only for the duration of a run.
#[derive(Clone)]
pub struct RunConfig {
    /// Run-level turn cap; the effective budget per agent is the minimum of
    /// this and the agent's own `max_turns`.
    pub max_turns: Option<usize>,

    /// Attach to an existing trace instead of opening a new one.
    pub trace_id: Option<String>,

    /// Grouping id correlating related traces.
    pub group_id: Option<String>,

    /// Run metadata, copied onto the trace and the run context.
    pub metadata: HashMap<String, Value>,

    /// Disable tracing for this run regardless of the process-wide flag.
    pub tracing_disabled: bool,

    /// When `false`, instructions, inputs, and outputs are recorded on spans
    /// as the literal `"[REDACTED]"`.
    pub trace_include_sensitive_data: bool,

    /// Whether this configuration was built for the streaming entry point.
    pub stream: bool,

    /// Override the model for every agent in the run.
    pub model_override: Option<String>,

    /// Workflow name used for new traces.
    pub workflow_name: String,

    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Stop sequences.
    pub stop: Option<Vec<String>>,
    /// Frequency penalty.
    pub frequency_penalty: Option<f32>,
    /// Presence penalty.
    pub presence_penalty: Option<f32>,
    /// End-user identifier forwarded to the provider.
    pub user: Option<String>,

    /// Run-level lifecycle hooks.
    pub hooks: Option<SharedRunHooks>,

    /// Run-level input guardrails, evaluated before agent-level ones.
    pub input_guardrails: Vec<InputGuardrail>,

    /// Run-level output guardrails, evaluated before agent-level ones.
    pub output_guardrails: Vec<OutputGuardrail>,

    /// Run-wide default provider for agents that do not set their own.
    pub provider: Option<Arc<dyn crate::chat::ModelProvider>>,

    /// Cooperative cancellation flag, observed before each turn.
    pub stop_token: Option<StopToken>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            trace_id: None,
            group_id: None,
            metadata: HashMap::new(),
            tracing_disabled: false,
            trace_include_sensitive_data: true,
            stream: false,
            model_override: None,
            workflow_name: String::new(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            user: None,
            hooks: None,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            provider: None,
            stop_token: None,
        }
    }
}

impl RunConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The workflow name, defaulted when unset.
    #[must_use]
    pub fn workflow_name(&self) -> &str {
        if self.workflow_name.is_empty() {
            DEFAULT_WORKFLOW_NAME
        } else {
            &self.workflow_name
        }
    }

    /// Set the run-level turn cap.
    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Set the workflow name for new traces.
    #[must_use]
    pub fn with_workflow_name(mut self, name: impl Into<String>) -> Self {
        self.workflow_name = name.into();
        self
    }

    /// Attach run-level hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: SharedRunHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Set the run-wide default provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn crate::chat::ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a run-level input guardrail.
    #[must_use]
    pub fn with_input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Add a run-level output guardrail.
    #[must_use]
    pub fn with_output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Attach a cooperative stop token.
    #[must_use]
    pub fn with_stop_token(mut self, token: StopToken) -> Self {
        self.stop_token = Some(token);
        self
    }

    /// Redact or disable sensitive span data.
    #[must_use]
    pub const fn with_sensitive_data(mut self, include: bool) -> Self {
        self.trace_include_sensitive_data = include;
        self
    }

    /// Override the model for every agent in the run.
    #[must_use]
    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("workflow_name", &self.workflow_name())
            .field("tracing_disabled", &self.tracing_disabled)
            .field("stream", &self.stream)
            .field("model_override", &self.model_override)
            .finish_non_exhaustive()
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// The full conversation, including the seeded input.
    pub messages: Vec<Message>,
    /// Name of the agent that produced the final output.
    pub last_agent: String,
    /// The final agent's turn counter at termination.
    pub turns: usize,
    /// The terminal output: plain text, or a parsed value when the agent
    /// declared an output schema.
    pub final_output: Value,
    /// Cumulative token usage across all model calls.
    pub usage: Usage,
}

impl RunResult {
    /// The final output as text.
    #[must_use]
    pub fn final_text(&self) -> String {
        match &self.final_output {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// A fatal run failure carrying the partial run state.
///
/// This is the non-throwing counterpart of the raw [`Error`]: the
/// conversation so far, the last active agent, and the turn counter survive
/// the failure for inspection.
#[derive(Debug)]
pub struct RunError {
    /// The fatal error that ended the run.
    pub error: Error,
    /// The conversation at the point of failure.
    pub messages: Vec<Message>,
    /// Name of the agent that was active when the run failed.
    pub last_agent: String,
    /// That agent's turn counter at the point of failure.
    pub turns: usize,
}

impl RunError {
    pub(crate) fn bare(error: Error) -> Self {
        Self {
            error,
            messages: Vec::new(),
            last_agent: String::new(),
            turns: 0,
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<RunError> for Error {
    fn from(run_error: RunError) -> Self {
        run_error.error
    }
}

/// Record of one dispatched tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// The provider-assigned tool call id.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Parsed arguments, or `Null` when argument parsing failed.
    pub arguments: Value,
    /// The formatted result text appended to the conversation.
    pub result: String,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Events yielded by [`Runner::run_streamed`](super::Runner::run_streamed).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run started.
    RunStarted {
        /// The initial agent.
        agent_name: String,
    },
    /// A turn started.
    TurnStarted {
        /// The active agent.
        agent_name: String,
        /// The agent's turn counter before this turn.
        turn: usize,
    },
    /// A bridge event from the in-flight model stream.
    Stream(StreamEvent),
    /// A dispatched tool call completed.
    ToolCallCompleted {
        /// The completed record.
        record: ToolCallRecord,
    },
    /// Control transferred between agents.
    Handoff {
        /// The agent that gave up control.
        from: String,
        /// The agent that received control.
        to: String,
    },
    /// A turn completed without terminating the run.
    TurnCompleted {
        /// The active agent.
        agent_name: String,
        /// The agent's turn counter after this turn.
        turn: usize,
    },
    /// The run completed.
    RunCompleted {
        /// The final result.
        result: Box<RunResult>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_coercions() {
        let from_text = UserInput::from("ping").into_messages();
        assert_eq!(from_text.len(), 1);
        assert_eq!(from_text[0].content, "ping");

        let prefix = vec![Message::user("a"), Message::assistant("b")];
        let from_prefix = UserInput::from(prefix.clone()).into_messages();
        assert_eq!(from_prefix, prefix);
    }

    #[test]
    fn workflow_name_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.workflow_name(), "Agent workflow");

        let config = RunConfig::default().with_workflow_name("Support flow");
        assert_eq!(config.workflow_name(), "Support flow");
    }

    #[test]
    fn run_error_preserves_partial_state() {
        let run_error = RunError {
            error: Error::MaxTurnsExceeded(3),
            messages: vec![Message::user("hi")],
            last_agent: "A".to_owned(),
            turns: 3,
        };
        assert_eq!(run_error.to_string(), "Maximum turns (3) exceeded");
        assert_eq!(run_error.messages.len(), 1);
        let error: Error = run_error.into();
        assert!(matches!(error, Error::MaxTurnsExceeded(3)));
    }

    #[test]
    fn final_text_renders_values() {
        let result = RunResult {
            messages: Vec::new(),
            last_agent: "A".to_owned(),
            turns: 1,
            final_output: serde_json::json!({"city": "Paris"}),
            usage: Usage::zero(),
        };
        assert_eq!(result.final_text(), r#"{"city":"Paris"}"#);
    }
}
