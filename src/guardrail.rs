//! Guardrails — tripwire-based safety checks over agent inputs and outputs.
//!
//! - **[`InputGuardrail`]** — validates the most recent user message before
//!   each model call (e.g., off-topic detection, content filtering).
//! - **[`OutputGuardrail`]** — validates the final assistant content at run
//!   termination (e.g., PII detection, format checking).
//!
//! # Tripwire Mechanism
//!
//! Each check returns a [`GuardrailOutput`] carrying a `tripwire_triggered`
//! flag. A triggered tripwire halts the run immediately with
//! [`Error::InputGuardrailTriggered`](crate::Error) or
//! [`Error::OutputGuardrailTriggered`](crate::Error), carrying the guardrail
//! name, the offending content, and the check's `output_info`.
//!
//! Guardrails from run config and agent definition are combined (run-level
//! first) and evaluated sequentially in registration order.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::Result;

/// The output of a guardrail check.
#[derive(Debug, Clone)]
pub struct GuardrailOutput {
    /// Whether the tripwire was triggered. If `true`, the run is halted.
    pub tripwire_triggered: bool,

    /// Structured information about the check, included in the resulting
    /// error for observability.
    pub output_info: Value,
}

impl GuardrailOutput {
    /// A passing output (tripwire not triggered).
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
        }
    }

    /// A failing output (tripwire triggered) with diagnostic info.
    #[must_use]
    pub fn tripwire(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: true,
            output_info: info.into(),
        }
    }

    /// A passing output that still records diagnostic info.
    #[must_use]
    pub fn pass_with_info(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: info.into(),
        }
    }

    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.tripwire_triggered
    }
}

/// Check logic for an input guardrail.
#[async_trait]
pub trait InputGuardrailCheck: Send + Sync {
    /// Evaluate the most recent user message.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        content: &str,
    ) -> Result<GuardrailOutput>;
}

/// Check logic for an output guardrail.
#[async_trait]
pub trait OutputGuardrailCheck: Send + Sync {
    /// Evaluate the agent's final output content.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        content: &str,
    ) -> Result<GuardrailOutput>;
}

/// A named input guardrail evaluated before each model call.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    check: Arc<dyn InputGuardrailCheck>,
}

impl InputGuardrail {
    /// Create an input guardrail with a name and check logic.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl InputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The guardrail's name, used in tracing and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check against the most recent user message.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        content: &str,
    ) -> Result<GuardrailResult> {
        let output = self.check.check(context, agent_name, content).await?;
        Ok(GuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A named output guardrail evaluated at run termination.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    check: Arc<dyn OutputGuardrailCheck>,
}

impl OutputGuardrail {
    /// Create an output guardrail with a name and check logic.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl OutputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The guardrail's name, used in tracing and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check against the final assistant content.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        content: &str,
    ) -> Result<GuardrailResult> {
        let output = self.check.check(context, agent_name, content).await?;
        Ok(GuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running a guardrail.
#[derive(Debug, Clone)]
pub struct GuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,

    /// The check output.
    pub output: GuardrailOutput,
}

impl GuardrailResult {
    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BanWord(&'static str);

    #[async_trait]
    impl InputGuardrailCheck for BanWord {
        async fn check(
            &self,
            _context: &RunContext,
            _agent_name: &str,
            content: &str,
        ) -> Result<GuardrailOutput> {
            if content.contains(self.0) {
                Ok(GuardrailOutput::tripwire(format!("found '{}'", self.0)))
            } else {
                Ok(GuardrailOutput::pass())
            }
        }
    }

    #[tokio::test]
    async fn tripwire_fires_on_match() {
        let guardrail = InputGuardrail::new("ban-secret", BanWord("secret"));
        let ctx = RunContext::default();

        let result = guardrail
            .run(&ctx, "agent", "tell me the secret")
            .await
            .expect("check runs");
        assert!(result.is_triggered());
        assert_eq!(result.guardrail_name, "ban-secret");

        let result = guardrail
            .run(&ctx, "agent", "tell me a story")
            .await
            .expect("check runs");
        assert!(!result.is_triggered());
    }

    #[test]
    fn pass_with_info_keeps_tripwire_off() {
        let output = GuardrailOutput::pass_with_info(serde_json::json!({"score": 0.2}));
        assert!(!output.is_triggered());
        assert_eq!(output.output_info["score"], 0.2);
    }
}
