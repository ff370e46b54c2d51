//! Handoff detection and the handoff tool builder.
//!
//! Two signals transfer control between agents, checked in priority order:
//!
//! 1. **Tool-based**: the model calls a `transfer_to_<slug>` tool that the
//!    runtime registered for a handoff target. The matched call is
//!    acknowledged with a tool-result message naming the target.
//! 2. **Textual**: the assistant content matches `HANDOFF:\s*(\w+)`; the
//!    captured word is the target agent's name. The `\w+` capture cannot
//!    express multi-word names — those are reachable only through the tool
//!    route, whose slug collapses non-alphanumerics.
//!
//! Resolution goes through [`Agent::find_handoff`]; an unresolvable target
//! is fatal ([`Error::HandoffTargetNotFound`](crate::Error)).

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::Agent;
use crate::message::Message;
use crate::tool::ToolDefinition;

static TEXTUAL_HANDOFF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HANDOFF:\s*(\w+)").expect("handoff pattern is valid")
});

/// Slugify an agent name for use in a handoff tool name: lowercase,
/// non-alphanumerics collapsed to single underscores.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// The tool name the runtime registers for handing off to `agent_name`.
#[must_use]
pub fn handoff_tool_name(agent_name: &str) -> String {
    format!("transfer_to_{}", slugify(agent_name))
}

/// Builder for tool-shaped handoffs.
///
/// A handoff is exposed to the model as a zero-argument function tool whose
/// invocation designates the target agent.
#[derive(Debug, Clone)]
pub struct Handoff {
    target_name: String,
}

impl Handoff {
    /// Create a handoff descriptor for the given target agent.
    #[must_use]
    pub fn to(target: &Agent) -> Self {
        Self::to_name(target.name())
    }

    /// Create a handoff descriptor from a target name.
    #[must_use]
    pub fn to_name(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
        }
    }

    /// The target agent's name.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// The tool name the model calls to trigger this handoff.
    #[must_use]
    pub fn tool_name(&self) -> String {
        handoff_tool_name(&self.target_name)
    }

    /// The provider-facing tool definition for this handoff.
    #[must_use]
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.tool_name(),
            format!(
                "Transfer the conversation to the {} agent.",
                self.target_name
            ),
            serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    /// The acknowledgment payload appended as the handoff call's tool result.
    #[must_use]
    pub fn acknowledgment(&self) -> String {
        serde_json::json!({ "assistant": self.target_name }).to_string()
    }
}

/// How a handoff was signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandoffSource {
    /// A `transfer_to_<slug>` tool call.
    ToolCall,
    /// An in-text `HANDOFF: <name>` marker.
    Text,
}

/// A detected (not yet resolved) handoff signal.
#[derive(Debug, Clone)]
pub(crate) struct DetectedHandoff {
    pub target_name: String,
    pub source: HandoffSource,
    /// Id of the matched tool call, for tool-based handoffs.
    pub tool_call_id: Option<String>,
}

/// Scan an assistant message for handoff signals against the agent's
/// registered targets. Tool-based wins when both signals appear.
pub(crate) fn detect(agent: &Agent, message: &Message) -> Option<DetectedHandoff> {
    let handoffs = agent.handoffs();

    for call in message.tool_calls() {
        if let Some(target) = handoffs
            .iter()
            .find(|h| handoff_tool_name(h.name()) == call.name())
        {
            return Some(DetectedHandoff {
                target_name: target.name().to_owned(),
                source: HandoffSource::ToolCall,
                tool_call_id: Some(call.id.clone()),
            });
        }
    }

    if let Some(captures) = TEXTUAL_HANDOFF.captures(&message.content) {
        return Some(DetectedHandoff {
            target_name: captures[1].to_owned(),
            source: HandoffSource::Text,
            tool_call_id: None,
        });
    }

    None
}

/// Collect the handoff tool definitions for an agent's registered targets.
pub(crate) fn tool_definitions(handoffs: &[Arc<Agent>]) -> Vec<ToolDefinition> {
    handoffs
        .iter()
        .map(|target| Handoff::to(target).tool_definition())
        .collect()
}
