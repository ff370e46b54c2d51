//! Span types — timed, attributed nodes in the trace tree.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of operation a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// One agent turn.
    Agent,
    /// A dispatched tool call.
    Tool,
    /// A control transfer between agents.
    Handoff,
    /// A guardrail evaluation.
    Guardrail,
    /// A model call.
    Generation,
    /// User-defined.
    Custom,
}

impl SpanKind {
    /// The string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Handoff => "handoff",
            Self::Guardrail => "guardrail",
            Self::Generation => "generation",
            Self::Custom => "custom",
        }
    }
}

/// Completion status of a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Still open, or closed without an explicit status.
    #[default]
    Unset,
    /// Completed successfully.
    Ok,
    /// Completed with a recorded failure.
    Error,
}

/// A timestamped event attached to a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    /// Event name.
    pub name: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

/// A node in the trace tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Locally unique span id (`span_<32 alphanumerics>`).
    pub span_id: String,
    /// The owning trace id.
    pub trace_id: String,
    /// Parent span id; `None` for root spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// What kind of operation this span represents.
    pub kind: SpanKind,
    /// Span name (e.g., `agent.Assistant`, `tool.weather`).
    pub name: String,
    /// When the span was opened.
    pub started_at: DateTime<Utc>,
    /// When the span was closed; `None` while open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Completion status.
    #[serde(default)]
    pub status: SpanStatus,
    /// Key-value attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
    /// Recorded events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
    /// Recorded exception, when one was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl Span {
    /// Open a new span under the given trace and parent.
    #[must_use]
    pub fn start(
        trace_id: impl Into<String>,
        parent_id: Option<String>,
        kind: SpanKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            span_id: new_span_id(),
            trace_id: trace_id.into(),
            parent_id,
            kind,
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            status: SpanStatus::Unset,
            attributes: HashMap::new(),
            events: Vec::new(),
            exception: None,
        }
    }

    /// Set an attribute on the span.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Append a timestamped event.
    pub fn add_event(&mut self, name: impl Into<String>, attributes: HashMap<String, Value>) {
        self.events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        });
    }

    /// Record an exception, marking the span as failed.
    pub fn record_exception(&mut self, message: impl Into<String>) {
        self.exception = Some(message.into());
        self.status = SpanStatus::Error;
    }

    /// Close the span. An `Unset` status is promoted to `Ok` unless an
    /// exception was recorded.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
        if self.status == SpanStatus::Unset {
            self.status = SpanStatus::Ok;
        }
    }

    /// Whether the span has been closed.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Generate a locally unique span id.
#[must_use]
pub fn new_span_id() -> String {
    format!("span_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_id_shape() {
        let id = new_span_id();
        assert!(id.starts_with("span_"));
        assert_eq!(id.len(), "span_".len() + 32);
    }

    #[test]
    fn end_promotes_unset_to_ok() {
        let mut span = Span::start("trace_x", None, SpanKind::Agent, "agent.test");
        assert!(!span.is_ended());
        span.end();
        assert_eq!(span.status, SpanStatus::Ok);
        assert!(span.started_at <= span.ended_at.expect("ended"));
    }

    #[test]
    fn exception_marks_error_and_survives_end() {
        let mut span = Span::start("trace_x", None, SpanKind::Tool, "tool.weather");
        span.record_exception("boom");
        span.end();
        assert_eq!(span.status, SpanStatus::Error);
        assert_eq!(span.exception.as_deref(), Some("boom"));
    }

    #[test]
    fn events_and_attributes_accumulate() {
        let mut span = Span::start("trace_x", None, SpanKind::Handoff, "handoff");
        span.set_attribute("handoff.from", "A");
        span.set_attribute("handoff.to", "B");
        span.add_event("resolved", HashMap::new());
        assert_eq!(span.attributes.len(), 2);
        assert_eq!(span.events.len(), 1);
    }
}
