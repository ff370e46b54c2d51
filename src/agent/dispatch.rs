//! Tool dispatch — parse, invoke, format, trace.
//!
//! Tool calls from one assistant message execute sequentially, in the order
//! the provider emitted them. Each call appends exactly one `tool` message
//! correlated by `tool_call_id`. Failures at any stage (unknown tool,
//! malformed argument JSON, handler error) are contained: they are recorded
//! on the tool span and surfaced to the model as an error tool-result,
//! never aborting the run. A malformed call — one with no id or no name —
//! is the model misbehaving and is fatal.

use serde_json::Value;
use tracing::warn;

use super::Agent;
use super::handoff::{DetectedHandoff, Handoff};
use super::hook::HookPair;
use super::result::ToolCallRecord;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::message::{Message, ToolCall};
use crate::trace::{SpanKind, TraceContext};

const REDACTED: &str = "[REDACTED]";

/// Dispatch the tool calls of one assistant message.
///
/// A detected tool-based handoff call is not executed; its slot receives the
/// handoff acknowledgment instead, keeping tool results in provider order.
pub(super) async fn dispatch(
    calls: &[ToolCall],
    handoff: Option<&DetectedHandoff>,
    agent: &Agent,
    ctx: &mut RunContext,
    trace: &mut TraceContext,
    hooks: &HookPair<'_>,
    include_sensitive: bool,
) -> Result<Vec<ToolCallRecord>> {
    let mut records = Vec::with_capacity(calls.len());

    for call in calls {
        if call.id.is_empty() {
            return Err(Error::model_behavior(format!(
                "tool call for '{}' is missing an id",
                call.name()
            )));
        }
        if call.name().is_empty() {
            return Err(Error::model_behavior(format!(
                "tool call '{}' is missing a function name",
                call.id
            )));
        }

        if let Some(detected) = handoff.filter(|h| h.tool_call_id.as_deref() == Some(call.id.as_str())) {
            records.push(acknowledge_handoff(call, detected, ctx));
            continue;
        }

        records.push(dispatch_one(call, agent, ctx, trace, hooks, include_sensitive).await);
    }

    Ok(records)
}

/// Append the acknowledgment tool-result for a tool-based handoff call.
fn acknowledge_handoff(
    call: &ToolCall,
    detected: &DetectedHandoff,
    ctx: &mut RunContext,
) -> ToolCallRecord {
    let content = Handoff::to_name(detected.target_name.as_str()).acknowledgment();
    ctx.push_message(Message::tool(call.id.as_str(), content.as_str()));
    ToolCallRecord {
        id: call.id.clone(),
        name: call.name().to_owned(),
        arguments: Value::Null,
        result: content,
        success: true,
    }
}

/// Execute a single tool call with tracing and lifecycle hooks.
async fn dispatch_one(
    call: &ToolCall,
    agent: &Agent,
    ctx: &mut RunContext,
    trace: &mut TraceContext,
    hooks: &HookPair<'_>,
    include_sensitive: bool,
) -> ToolCallRecord {
    trace.start_span(format!("tool.{}", call.name()), SpanKind::Tool);
    trace.set_attribute("tool.name", call.name());
    trace.set_attribute("tool.call_id", call.id.as_str());
    trace.set_attribute(
        "tool.input",
        if include_sensitive {
            call.function.arguments.clone()
        } else {
            REDACTED.to_owned()
        },
    );

    let (arguments, outcome) = match call.parse_arguments() {
        Ok(args) => {
            hooks.tool_start(ctx, call.name(), &args).await;
            let result = agent.execute_tool(call.name(), args.clone()).await;
            (args, result)
        }
        Err(e) => (
            Value::Null,
            Err(Error::tool_execution(
                call.name(),
                format!("invalid JSON arguments: {e}"),
            )),
        ),
    };

    let record = match outcome {
        Ok(value) => ToolCallRecord {
            id: call.id.clone(),
            name: call.name().to_owned(),
            arguments,
            result: format_tool_result(&value),
            success: true,
        },
        Err(e) => {
            warn!(tool = call.name(), error = %e, "tool call failed");
            trace.record_exception(e.to_string());
            ToolCallRecord {
                id: call.id.clone(),
                name: call.name().to_owned(),
                arguments,
                result: e.to_string(),
                success: false,
            }
        }
    };

    ctx.push_message(Message::tool(record.id.as_str(), record.result.as_str()));
    if record.success {
        hooks.tool_end(ctx, call.name(), &record.result).await;
    }

    trace.set_attribute(
        "tool.output",
        if include_sensitive {
            record.result.clone()
        } else {
            REDACTED.to_owned()
        },
    );
    trace.set_attribute("tool.success", record.success);
    trace.end_span();

    record
}

/// Format a tool return value as tool-result content: structured values
/// serialize to JSON, scalars stringify, `null` becomes the empty string.
pub(super) fn format_tool_result(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        structured => structured.to_string(),
    }
}
