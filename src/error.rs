//! Error types for the tsuru runtime.
//!
//! All fatal run-level failures are variants of [`Error`]. Tool-level
//! failures ([`Error::ToolNotFound`], [`Error::ToolExecution`]) are contained
//! by the dispatcher and surfaced to the model as error tool-results; every
//! other category bubbles out of the run.

use serde_json::Value;
use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy for agent runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The per-agent turn budget was exhausted.
    #[error("Maximum turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),

    /// A handoff named a target that is not registered on the current agent.
    #[error("Handoff target '{0}' not found")]
    HandoffTargetNotFound(String),

    /// No tool with the requested name exists on the agent.
    ///
    /// Raised by [`Agent::execute_tool`](crate::agent::Agent::execute_tool);
    /// the dispatcher catches it and converts it to an error tool-result.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// The model response was malformed (missing tool-call id, missing tool
    /// name, or content that violates the declared output schema beyond
    /// recovery).
    #[error("Model behavior error: {0}")]
    ModelBehavior(String),

    /// An input guardrail tripwire fired.
    #[error("Input guardrail '{name}' triggered")]
    InputGuardrailTriggered {
        /// Name of the guardrail that fired.
        name: String,
        /// The content the guardrail evaluated.
        content: String,
        /// Structured diagnostic info from the guardrail.
        info: Value,
    },

    /// An output guardrail tripwire fired.
    #[error("Output guardrail '{name}' triggered")]
    OutputGuardrailTriggered {
        /// Name of the guardrail that fired.
        name: String,
        /// The content the guardrail evaluated.
        content: String,
        /// Structured diagnostic info from the guardrail.
        info: Value,
    },

    /// The run's cooperative stop flag was observed before a turn.
    #[error("Execution stopped by user request")]
    ExecutionStopped,

    /// Transport, authentication, or rate-limit failure from the provider.
    #[error("Provider error: {message}")]
    Provider {
        /// Human-readable provider message.
        message: String,
        /// HTTP status class when the failure came from a response.
        status: Option<u16>,
    },

    /// A tool handler returned an error.
    ///
    /// Contained by the dispatcher; never aborts a run.
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution {
        /// Name of the tool that failed.
        tool: String,
        /// The underlying error message.
        message: String,
    },

    /// Invalid agent or run configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a [`Error::ModelBehavior`].
    #[must_use]
    pub fn model_behavior(message: impl Into<String>) -> Self {
        Self::ModelBehavior(message.into())
    }

    /// Create a [`Error::Configuration`].
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a [`Error::Provider`] without an HTTP status.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            status: None,
        }
    }

    /// Create a [`Error::ToolExecution`].
    #[must_use]
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a [`Error::InputGuardrailTriggered`].
    #[must_use]
    pub fn input_guardrail(name: impl Into<String>, content: impl Into<String>, info: Value) -> Self {
        Self::InputGuardrailTriggered {
            name: name.into(),
            content: content.into(),
            info,
        }
    }

    /// Create a [`Error::OutputGuardrailTriggered`].
    #[must_use]
    pub fn output_guardrail(
        name: impl Into<String>,
        content: impl Into<String>,
        info: Value,
    ) -> Self {
        Self::OutputGuardrailTriggered {
            name: name.into(),
            content: content.into(),
            info,
        }
    }

    /// Returns `true` for the tool-level categories that the dispatcher
    /// contains instead of aborting the run.
    #[must_use]
    pub const fn is_tool_error(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::ToolExecution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_turns_message_format() {
        let err = Error::MaxTurnsExceeded(3);
        assert_eq!(err.to_string(), "Maximum turns (3) exceeded");
    }

    #[test]
    fn handoff_target_names_the_target() {
        let err = Error::HandoffTargetNotFound("Billing".to_owned());
        assert!(err.to_string().contains("Billing"));
    }

    #[test]
    fn tool_errors_are_contained() {
        assert!(Error::ToolNotFound("weather".to_owned()).is_tool_error());
        assert!(Error::tool_execution("weather", "boom").is_tool_error());
        assert!(!Error::ExecutionStopped.is_tool_error());
        assert!(!Error::MaxTurnsExceeded(1).is_tool_error());
    }

    #[test]
    fn guardrail_errors_carry_info() {
        let err = Error::input_guardrail("pii", "my ssn is...", serde_json::json!({"hits": 1}));
        if let Error::InputGuardrailTriggered { name, content, info } = err {
            assert_eq!(name, "pii");
            assert!(content.starts_with("my ssn"));
            assert_eq!(info["hits"], 1);
        } else {
            unreachable!("constructor produced the wrong variant");
        }
    }
}
