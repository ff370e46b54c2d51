//! Hierarchical tracing for agent runs.
//!
//! Each run opens a [`Trace`] and records [`Span`]s for agent turns, model
//! calls, tool dispatches, guardrail evaluations, and handoffs. Registered
//! [`SpanProcessor`]s receive every span start and end; the process-wide
//! [`TraceProvider`] owns the processor list and the enabled flag
//! (`OPENAI_AGENTS_DISABLE_TRACING`).
//!
//! Span nesting is stack-based per execution flow, with one deliberate
//! exception: at the start of every turn the executor re-roots, so each
//! `agent.<name>` span is a top-level node of the trace tree regardless of
//! any caller-provided ambient span. See [`TraceContext::begin_root`].

mod context;
mod processor;
mod provider;
mod span;

pub use context::{RootToken, Trace, TraceContext, new_trace_id};
pub use processor::{
    BatchConfig, BatchSpanProcessor, InMemorySpanProcessor, LoggingSpanProcessor, SpanExporter,
    SpanProcessor,
};
pub use provider::{TraceProvider, provider};
pub use span::{Span, SpanEvent, SpanKind, SpanStatus, new_span_id};
