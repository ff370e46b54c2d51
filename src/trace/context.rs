//! The per-run trace and its span-stack context.
//!
//! [`TraceContext`] owns the state for one execution flow: the current
//! [`Trace`] and a stack of open spans. Nesting follows the stack — a new
//! span's parent is the span on top. The executor's per-turn re-rooting is a
//! first-class operation here: [`TraceContext::begin_root`] saves and clears
//! the stack so the agent span opens parentless, and
//! [`TraceContext::end_root`] restores the saved stack.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::provider::provider;
use super::span::{Span, SpanKind};

/// Generate a trace id matching `^trace_[A-Za-z0-9]{32}$`.
#[must_use]
pub fn new_trace_id() -> String {
    format!("trace_{}", uuid::Uuid::new_v4().simple())
}

/// A named trace root; the lifetime of one run's observability data.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Trace id (`trace_<32 alphanumerics>`).
    pub trace_id: String,
    /// Workflow name for this trace.
    pub name: String,
    /// Optional grouping id correlating related traces.
    pub group_id: Option<String>,
    /// Trace-level metadata.
    pub metadata: HashMap<String, Value>,
    /// When the trace was opened.
    pub started_at: DateTime<Utc>,
    /// When the trace was closed; `None` while active.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Token returned by [`TraceContext::begin_root`]; holds the saved span
/// stack until the matching [`TraceContext::end_root`].
#[derive(Debug)]
#[must_use = "the saved span stack is restored by end_root"]
pub struct RootToken {
    saved: Vec<Span>,
}

/// Span-stack context for one execution flow.
#[derive(Debug, Default)]
pub struct TraceContext {
    trace: Option<Trace>,
    stack: Vec<Span>,
}

impl TraceContext {
    /// Open a trace context attached to a new or ambient trace.
    ///
    /// When `trace_id` is supplied the context attaches to that trace;
    /// otherwise a fresh id is generated. Returns a disabled context when
    /// tracing is off process-wide.
    #[must_use]
    pub fn start(
        name: impl Into<String>,
        trace_id: Option<String>,
        group_id: Option<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        if !provider().is_enabled() {
            return Self::disabled();
        }
        Self {
            trace: Some(Trace {
                trace_id: trace_id.unwrap_or_else(new_trace_id),
                name: name.into(),
                group_id,
                metadata,
                started_at: Utc::now(),
                ended_at: None,
            }),
            stack: Vec::new(),
        }
    }

    /// A context that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether this context records spans.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.trace.is_some()
    }

    /// The active trace, when enabled.
    #[must_use]
    pub const fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// The active trace id, when enabled.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.trace_id.as_str())
    }

    /// Open a span as a child of the current top-of-stack span.
    pub fn start_span(&mut self, name: impl Into<String>, kind: SpanKind) {
        let Some(trace) = &self.trace else {
            return;
        };
        let parent_id = self.stack.last().map(|s| s.span_id.clone());
        let span = Span::start(trace.trace_id.clone(), parent_id, kind, name);
        provider().emit_start(&span);
        self.stack.push(span);
    }

    /// Close the top-of-stack span and notify processors.
    pub fn end_span(&mut self) -> Option<Span> {
        let mut span = self.stack.pop()?;
        span.end();
        provider().emit_end(&span);
        Some(span)
    }

    /// Set an attribute on the top-of-stack span.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(span) = self.stack.last_mut() {
            span.set_attribute(key, value);
        }
    }

    /// Append an event to the top-of-stack span.
    pub fn add_event(&mut self, name: impl Into<String>, attributes: HashMap<String, Value>) {
        if let Some(span) = self.stack.last_mut() {
            span.add_event(name, attributes);
        }
    }

    /// Record an exception on the top-of-stack span.
    pub fn record_exception(&mut self, message: impl Into<String>) {
        if let Some(span) = self.stack.last_mut() {
            span.record_exception(message);
        }
    }

    /// Save and clear the span stack, then open `name` as a parentless root
    /// span under the active trace.
    ///
    /// The executor calls this at the start of each turn so the agent span
    /// is always visible at the top level of the trace tree, detached from
    /// any caller-provided span.
    pub fn begin_root(&mut self, name: impl Into<String>, kind: SpanKind) -> RootToken {
        let saved = std::mem::take(&mut self.stack);
        self.start_span(name, kind);
        RootToken { saved }
    }

    /// Close every span opened since [`begin_root`](Self::begin_root)
    /// (normally just the root itself) and restore the saved stack.
    pub fn end_root(&mut self, token: RootToken) {
        while self.end_span().is_some() {}
        self.stack = token.saved;
    }

    /// Close the trace. Open spans are closed first (LIFO), and processors
    /// are flushed so the per-run trace terminates cleanly.
    pub fn finish(&mut self) {
        while self.end_span().is_some() {}
        if let Some(trace) = &mut self.trace {
            trace.ended_at = Some(Utc::now());
        }
        provider().force_flush();
    }

    #[cfg(test)]
    pub(crate) fn open_depth(&self) -> usize {
        self.stack.len()
    }
}
