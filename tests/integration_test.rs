//! End-to-end tests for the orchestration runtime.
//!
//! Every scenario runs against the scripted [`MockProvider`] and a shared
//! in-memory span collector; span assertions filter by the per-test trace id
//! so concurrently running tests do not interfere.

#![allow(clippy::unwrap_used, clippy::panic, clippy::clone_on_ref_ptr)]

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::StreamExt as _;
use serde_json::{Value, json};
use tsuru::prelude::*;
use tsuru::trace::{new_trace_id, provider};

static COLLECTOR: LazyLock<Arc<InMemorySpanProcessor>> = LazyLock::new(|| {
    let collector = Arc::new(InMemorySpanProcessor::new());
    provider().add_processor(Arc::clone(&collector) as Arc<dyn SpanProcessor>);
    collector
});

/// A traced run config: returns the config plus the trace id to filter
/// collected spans by.
fn traced_config() -> (RunConfig, String) {
    let trace_id = new_trace_id();
    let config = RunConfig {
        trace_id: Some(trace_id.clone()),
        ..RunConfig::default()
    };
    // Touch the collector so it is registered before the run starts.
    let _ = COLLECTOR.ended().len();
    (config, trace_id)
}

fn spans_for(trace_id: &str) -> Vec<Span> {
    COLLECTOR
        .ended()
        .into_iter()
        .filter(|s| s.trace_id == trace_id)
        .collect()
}

fn weather_tool() -> FunctionTool {
    FunctionTool::from_fn(
        "weather",
        "Look up current weather for a city.",
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
        |args| async move {
            assert!(args["city"].is_string(), "weather tool requires a city");
            Ok(json!("sunny 22"))
        },
    )
}

/// Every tool message must reference a tool call emitted by an earlier
/// assistant message.
fn assert_tool_results_correlated(messages: &[Message]) {
    let mut seen_call_ids = Vec::new();
    for message in messages {
        match message.role {
            Role::Assistant => {
                seen_call_ids.extend(message.tool_calls().iter().map(|c| c.id.clone()));
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap();
                assert!(
                    seen_call_ids.iter().any(|seen| seen == id),
                    "tool message references unknown call id {id}"
                );
            }
            _ => {}
        }
    }
}

/// Span timestamps and parent links must be internally consistent.
fn assert_span_tree_well_formed(spans: &[Span]) {
    for span in spans {
        let ended = span.ended_at.unwrap();
        assert!(span.started_at <= ended, "span {} ends before it starts", span.name);
        if let Some(parent_id) = &span.parent_id {
            let parent = spans
                .iter()
                .find(|s| &s.span_id == parent_id)
                .unwrap_or_else(|| panic!("span {} has unknown parent", span.name));
            assert_eq!(parent.trace_id, span.trace_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario 1: single-turn echo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_turn_echo() {
    let provider = Arc::new(MockProvider::new().then_text("pong"));
    let agent = Arc::new(Agent::new("Echo").provider(provider.clone()));
    let (config, trace_id) = traced_config();

    let result = Runner::run(&agent, "ping", config).await.unwrap();

    assert_eq!(result.turns, 1);
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.messages[0].role, Role::User);
    assert_eq!(result.messages[1].role, Role::Assistant);
    assert_eq!(result.final_output, json!("pong"));
    assert_eq!(result.last_agent, "Echo");
    assert_eq!(provider.call_count(), 1);

    let spans = spans_for(&trace_id);
    let agent_spans: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::Agent).collect();
    assert_eq!(agent_spans.len(), 1);
    assert_eq!(agent_spans[0].name, "agent.Echo");
    assert!(agent_spans[0].parent_id.is_none());
    assert_span_tree_well_formed(&spans);
}

// ---------------------------------------------------------------------------
// Scenario 2: tool roundtrip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tool_roundtrip() {
    let provider = Arc::new(
        MockProvider::new()
            .then_tool_call("call_1", "weather", r#"{"city":"Paris"}"#)
            .then_text("Paris: sunny 22"),
    );
    let agent = Arc::new(
        Agent::new("Forecaster")
            .instructions("Answer weather questions.")
            .tool(weather_tool())
            .provider(provider.clone()),
    );
    let (config, trace_id) = traced_config();

    let result = Runner::run(&agent, "Paris weather", config).await.unwrap();

    assert_eq!(result.turns, 2);
    let roles: Vec<Role> = result.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(result.messages[2].content, "sunny 22");
    assert_eq!(result.messages[2].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(result.final_output, json!("Paris: sunny 22"));
    assert_tool_results_correlated(&result.messages);

    let spans = spans_for(&trace_id);
    let agent_spans: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::Agent).collect();
    assert_eq!(agent_spans.len(), 2);

    let tool_spans: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::Tool).collect();
    assert_eq!(tool_spans.len(), 1);
    assert_eq!(tool_spans[0].name, "tool.weather");
    // The tool span hangs off the agent span of the turn that carried the
    // tool call.
    let parent_id = tool_spans[0].parent_id.as_deref().unwrap();
    assert!(agent_spans.iter().any(|s| s.span_id == parent_id));
    assert_span_tree_well_formed(&spans);
}

// ---------------------------------------------------------------------------
// Scenario 3: textual handoff
// ---------------------------------------------------------------------------

#[tokio::test]
async fn textual_handoff_transfers_control() {
    let provider = Arc::new(
        MockProvider::new()
            .then_text("Let me transfer. HANDOFF: B")
            .then_text("Hello from B."),
    );
    let b = Arc::new(Agent::new("B").provider(provider.clone()));
    let a = Arc::new(Agent::new("A").handoff(b.clone()).provider(provider.clone()));
    let (config, trace_id) = traced_config();

    let result = Runner::run(&a, "help me", config).await.unwrap();

    assert_eq!(result.last_agent, "B");
    // B's counter started at zero and ran one turn.
    assert_eq!(result.turns, 1);
    assert_eq!(result.final_output, json!("Hello from B."));

    let spans = spans_for(&trace_id);
    let handoff_span = spans
        .iter()
        .find(|s| s.kind == SpanKind::Handoff)
        .expect("handoff span recorded");
    assert_eq!(handoff_span.attributes["handoff.from"], json!("A"));
    assert_eq!(handoff_span.attributes["handoff.to"], json!("B"));

    let agent_names: Vec<&str> = spans
        .iter()
        .filter(|s| s.kind == SpanKind::Agent)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(agent_names, vec!["agent.A", "agent.B"]);
}

#[tokio::test]
async fn tool_based_handoff_acknowledges_the_call() {
    let provider = Arc::new(
        MockProvider::new()
            .then_tool_call("call_7", "transfer_to_billing_desk", "{}")
            .then_text("Billing here."),
    );
    let billing = Arc::new(Agent::new("Billing Desk").provider(provider.clone()));
    let triage = Arc::new(
        Agent::new("Triage")
            .handoff(billing.clone())
            .provider(provider.clone()),
    );

    let result = Runner::run(&triage, "I was double charged", RunConfig::default())
        .await
        .unwrap();

    assert_eq!(result.last_agent, "Billing Desk");
    let ack = result
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("handoff acknowledgment appended");
    assert_eq!(ack.tool_call_id.as_deref(), Some("call_7"));
    assert_eq!(ack.content, r#"{"assistant":"Billing Desk"}"#);
    assert_tool_results_correlated(&result.messages);
}

#[tokio::test]
async fn unresolvable_handoff_target_is_fatal() {
    let provider = Arc::new(MockProvider::new().then_text("HANDOFF: Nowhere"));
    let agent = Arc::new(Agent::new("A").handoff(Arc::new(Agent::new("B"))).provider(provider));

    let failure = Runner::run(&agent, "go", RunConfig::default()).await.unwrap_err();
    assert!(matches!(
        failure.error,
        Error::HandoffTargetNotFound(ref name) if name == "Nowhere"
    ));
    assert_eq!(failure.last_agent, "A");
    // The assistant message that carried the bad handoff is preserved.
    assert_eq!(failure.messages.len(), 2);
}

// ---------------------------------------------------------------------------
// Scenario 4: max turns guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn max_turns_guard_trips() {
    let looper = FunctionTool::from_fn(
        "poll",
        "Poll the job status.",
        json!({"type": "object", "properties": {}}),
        |_args| async move { Ok(json!("continue")) },
    );
    let mut provider = MockProvider::new();
    for i in 0..4 {
        provider = provider.then_tool_call(format!("call_{i}"), "poll", "{}");
    }
    let provider = Arc::new(provider);
    let agent = Arc::new(Agent::new("Poller").tool(looper).provider(provider.clone()));

    let config = RunConfig::default().with_max_turns(3);
    let failure = Runner::run(&agent, "poll until done", config).await.unwrap_err();

    assert!(matches!(failure.error, Error::MaxTurnsExceeded(3)));
    assert_eq!(failure.error.to_string(), "Maximum turns (3) exceeded");
    assert_eq!(failure.turns, 3);
    assert_eq!(provider.call_count(), 3);

    let assistants = failure
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.has_tool_calls())
        .count();
    let tools = failure.messages.iter().filter(|m| m.role == Role::Tool).count();
    assert_eq!(assistants, 3);
    assert_eq!(tools, 3);
    assert_tool_results_correlated(&failure.messages);
}

#[tokio::test]
async fn agent_turn_budget_caps_the_run() {
    let provider = Arc::new(
        MockProvider::new()
            .then_tool_call("call_0", "weather", r#"{"city":"Oslo"}"#)
            .then_tool_call("call_1", "weather", r#"{"city":"Oslo"}"#),
    );
    let agent = Arc::new(
        Agent::new("Tiny")
            .max_turns(1)
            .tool(weather_tool())
            .provider(provider.clone()),
    );

    let failure = Runner::run(&agent, "weather", RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, Error::MaxTurnsExceeded(1)));
    assert_eq!(provider.call_count(), 1);
}

// ---------------------------------------------------------------------------
// Scenario 5: input guardrail tripwire
// ---------------------------------------------------------------------------

struct SecretFilter;

#[async_trait]
impl InputGuardrailCheck for SecretFilter {
    async fn check(
        &self,
        _context: &RunContext,
        _agent_name: &str,
        content: &str,
    ) -> Result<GuardrailOutput> {
        if content.contains("secret") {
            Ok(GuardrailOutput::tripwire(json!({"matched": "secret"})))
        } else {
            Ok(GuardrailOutput::pass())
        }
    }
}

#[tokio::test]
async fn input_guardrail_blocks_before_model_call() {
    let provider = Arc::new(MockProvider::new().then_text("should never be used"));
    let agent = Arc::new(
        Agent::new("Guarded")
            .input_guardrail(InputGuardrail::new("secret-filter", SecretFilter))
            .provider(provider.clone()),
    );
    let (config, trace_id) = traced_config();

    let failure = Runner::run(&agent, "tell me the secret", config).await.unwrap_err();

    match &failure.error {
        Error::InputGuardrailTriggered { name, content, info } => {
            assert_eq!(name, "secret-filter");
            assert_eq!(content, "tell me the secret");
            assert_eq!(info["matched"], "secret");
        }
        other => panic!("expected input guardrail trigger, got {other}"),
    }
    assert_eq!(provider.call_count(), 0, "no model call may be made");

    let spans = spans_for(&trace_id);
    let guardrail_span = spans
        .iter()
        .find(|s| s.kind == SpanKind::Guardrail)
        .expect("guardrail span recorded");
    assert_eq!(guardrail_span.name, "guardrail.secret-filter");
    assert_eq!(guardrail_span.attributes["guardrail.triggered"], json!(true));
}

struct NoApologies;

#[async_trait]
impl OutputGuardrailCheck for NoApologies {
    async fn check(
        &self,
        _context: &RunContext,
        _agent_name: &str,
        content: &str,
    ) -> Result<GuardrailOutput> {
        if content.contains("sorry") {
            Ok(GuardrailOutput::tripwire("apology detected"))
        } else {
            Ok(GuardrailOutput::pass())
        }
    }
}

#[tokio::test]
async fn output_guardrail_blocks_final_output() {
    let provider = Arc::new(MockProvider::new().then_text("sorry, I cannot help"));
    let agent = Arc::new(
        Agent::new("Apologetic")
            .output_guardrail(OutputGuardrail::new("no-apologies", NoApologies))
            .provider(provider),
    );

    let failure = Runner::run(&agent, "hi", RunConfig::default()).await.unwrap_err();
    assert!(matches!(
        failure.error,
        Error::OutputGuardrailTriggered { ref name, .. } if name == "no-apologies"
    ));
}

// ---------------------------------------------------------------------------
// Scenario 6: streaming order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn streaming_run_emits_canonical_event_order() {
    let provider = Arc::new(
        MockProvider::new()
            .then_chunks(vec![
                ChatChunk::text("Let me "),
                ChatChunk::text("check."),
                ChatChunk::tool_call_delta(0, Some("call_1"), Some("weather"), Some(r#"{"city":"Paris"}"#)),
            ])
            .then_chunks(vec![ChatChunk::text("Paris: sunny 22")]),
    );
    let agent = Arc::new(
        Agent::new("Forecaster")
            .tool(weather_tool())
            .provider(provider.clone()),
    );

    let mut stream = Runner::run_streamed(&agent, "Paris weather", RunConfig::default());
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    // First turn's bridge events, in canonical order.
    let first_turn_kinds: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Stream(event) => Some(event.kind()),
            _ => None,
        })
        .take_while(|k| *k != "response.completed")
        .collect();
    assert_eq!(
        first_turn_kinds,
        vec![
            "response.created",
            "response.output_item.added",
            "response.content_part.added",
            "response.output_text.delta",
            "response.output_text.delta",
            "response.content_part.done",
            "response.output_item.added",
            "response.function_call_arguments.delta",
            "response.output_item.done",
        ]
    );

    // Per-turn sequence numbers are gapless with exactly one created and
    // one completed.
    let mut per_turn: Vec<Vec<&StreamEvent>> = Vec::new();
    for event in &events {
        if let RunEvent::Stream(stream_event) = event {
            if stream_event.sequence_number == 0 {
                per_turn.push(Vec::new());
            }
            per_turn.last_mut().unwrap().push(stream_event);
        }
    }
    assert_eq!(per_turn.len(), 2);
    for turn_events in &per_turn {
        for (i, event) in turn_events.iter().enumerate() {
            assert_eq!(event.sequence_number, i as u64);
        }
        let created = turn_events.iter().filter(|e| e.kind() == "response.created").count();
        let completed = turn_events.iter().filter(|e| e.kind() == "response.completed").count();
        assert_eq!(created, 1);
        assert_eq!(completed, 1);
    }

    // The run finishes with the aggregated result.
    let RunEvent::RunCompleted { result } = events.last().unwrap() else {
        panic!("stream must end with RunCompleted");
    };
    assert_eq!(result.final_output, json!("Paris: sunny 22"));
    assert_eq!(result.turns, 2);
    assert_tool_results_correlated(&result.messages);

    // Tool completion was reported as an event too.
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::ToolCallCompleted { record } if record.name == "weather" && record.success
    )));
}

// ---------------------------------------------------------------------------
// Redaction, cancellation, and error containment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sensitive_data_redaction_on_spans() {
    let provider = Arc::new(MockProvider::new().then_text("pong"));
    let agent = Arc::new(
        Agent::new("Echo")
            .instructions("Echo the user.")
            .provider(provider),
    );
    let (config, trace_id) = traced_config();
    let config = config.with_sensitive_data(false);

    Runner::run(&agent, "ping", config).await.unwrap();

    let spans = spans_for(&trace_id);
    let agent_span = spans.iter().find(|s| s.kind == SpanKind::Agent).unwrap();
    assert_eq!(agent_span.attributes["agent.instructions"], json!("[REDACTED]"));
    assert_eq!(agent_span.attributes["agent.input"], json!("[REDACTED]"));
    assert_eq!(agent_span.attributes["agent.output"], json!("[REDACTED]"));
    // Non-sensitive attributes survive.
    assert_eq!(agent_span.attributes["agent.name"], json!("Echo"));
}

#[tokio::test]
async fn agent_span_records_token_totals() {
    let provider = Arc::new(
        MockProvider::new().then_text_with_usage("pong", Usage::new(12, 8)),
    );
    let agent = Arc::new(Agent::new("Echo").provider(provider));
    let (config, trace_id) = traced_config();

    let result = Runner::run(&agent, "ping", config).await.unwrap();
    assert_eq!(result.usage.total_tokens, 20);

    let spans = spans_for(&trace_id);
    let agent_span = spans.iter().find(|s| s.kind == SpanKind::Agent).unwrap();
    assert_eq!(agent_span.attributes["agent.tokens"], json!("20 total"));
}

#[tokio::test]
async fn stop_token_cancels_before_the_turn() {
    let provider = Arc::new(MockProvider::new().then_text("never"));
    let agent = Arc::new(Agent::new("Echo").provider(provider.clone()));

    let token = StopToken::new();
    token.stop();
    let config = RunConfig::default().with_stop_token(token);

    let failure = Runner::run(&agent, "ping", config).await.unwrap_err();
    assert!(matches!(failure.error, Error::ExecutionStopped));
    assert_eq!(provider.call_count(), 0);

    let notice = failure.messages.last().unwrap();
    assert_eq!(notice.role, Role::Assistant);
    assert_eq!(notice.content, "Execution stopped by user request.");
}

#[tokio::test]
async fn tool_failures_are_contained() {
    let flaky = FunctionTool::from_fn(
        "flaky",
        "Always fails.",
        json!({"type": "object", "properties": {}}),
        |_args| async move {
            Err(tsuru::Error::tool_execution("flaky", "disk on fire"))
        },
    );
    let provider = Arc::new(
        MockProvider::new()
            .then_tool_call("call_1", "flaky", "{}")
            .then_tool_call("call_2", "missing_tool", "{}")
            .then_tool_call("call_3", "flaky", "not json at all")
            .then_text("recovered"),
    );
    let agent = Arc::new(Agent::new("Sturdy").tool(flaky).provider(provider.clone()));

    let result = Runner::run(&agent, "go", RunConfig::default()).await.unwrap();

    // All three failures became tool-result messages; the run recovered.
    assert_eq!(result.final_output, json!("recovered"));
    let tool_messages: Vec<&Message> = result
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 3);
    assert!(tool_messages[0].content.contains("disk on fire"));
    assert!(tool_messages[1].content.contains("not found"));
    assert!(tool_messages[2].content.contains("invalid JSON arguments"));
    assert_tool_results_correlated(&result.messages);
}

#[tokio::test]
async fn provider_error_in_response_body_is_fatal() {
    let provider = Arc::new(MockProvider::new().then_error("rate limit exceeded"));
    let agent = Arc::new(Agent::new("Echo").provider(provider));

    let failure = Runner::run(&agent, "ping", RunConfig::default()).await.unwrap_err();
    assert!(matches!(
        failure.error,
        Error::Provider { ref message, .. } if message == "rate limit exceeded"
    ));
}

#[tokio::test]
async fn tool_call_without_id_is_model_misbehavior() {
    let provider = Arc::new(MockProvider::new().then_message(
        Message::assistant_with_tool_calls("", vec![ToolCall::new("", "weather", "{}")]),
    ));
    let agent = Arc::new(Agent::new("Echo").tool(weather_tool()).provider(provider));

    let failure = Runner::run(&agent, "ping", RunConfig::default()).await.unwrap_err();
    assert!(matches!(failure.error, Error::ModelBehavior(_)));
}

// ---------------------------------------------------------------------------
// Termination tokens and structured output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn termination_token_ends_run_despite_tool_calls() {
    let provider = Arc::new(MockProvider::new().then_message(
        Message::assistant_with_tool_calls(
            "Everything is FINISHED",
            vec![ToolCall::new("call_1", "weather", r#"{"city":"Nice"}"#)],
        ),
    ));
    let agent = Arc::new(Agent::new("Stopper").tool(weather_tool()).provider(provider.clone()));

    let result = Runner::run(&agent, "wrap up", RunConfig::default()).await.unwrap();

    assert_eq!(result.turns, 1);
    assert_eq!(provider.call_count(), 1);
    // The tool still ran before termination.
    assert!(result.messages.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn lowercase_tokens_do_not_terminate() {
    let provider = Arc::new(
        MockProvider::new()
            .then_tool_call("call_1", "weather", r#"{"city":"Nice"}"#)
            .then_text("the job is done"),
    );
    let agent = Arc::new(Agent::new("Casual").tool(weather_tool()).provider(provider.clone()));

    let result = Runner::run(&agent, "weather", RunConfig::default()).await.unwrap();
    assert_eq!(result.turns, 2);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn structured_output_parses_and_validates() {
    let provider = Arc::new(MockProvider::new().then_text(r#"{"city":"Paris","temp":22}"#));
    let schema = OutputSchema::new(
        "forecast",
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}, "temp": {"type": "number"}},
            "required": ["city"]
        }),
    );
    let agent = Arc::new(Agent::new("Structured").output_schema(schema).provider(provider.clone()));

    let result = Runner::run(&agent, "forecast", RunConfig::default()).await.unwrap();
    assert_eq!(result.final_output, json!({"city": "Paris", "temp": 22}));

    // The schema was forwarded to the provider as a response format.
    let request = &provider.requests()[0];
    assert!(request.response_format.is_some());
}

#[tokio::test]
async fn invalid_structured_output_passes_raw_content_through() {
    let provider = Arc::new(MockProvider::new().then_text("not json"));
    let schema = OutputSchema::new("forecast", json!({"type": "object", "required": ["city"]}));
    let agent = Arc::new(Agent::new("Structured").output_schema(schema).provider(provider));

    let result = Runner::run(&agent, "forecast", RunConfig::default()).await.unwrap();
    assert_eq!(result.final_output, json!("not json"));
}

// ---------------------------------------------------------------------------
// Prompt construction and tracing lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn system_prompt_enumerates_tools_and_handoffs() {
    let provider = Arc::new(MockProvider::new().then_text("ok"));
    let b = Arc::new(Agent::new("Billing"));
    let agent = Arc::new(
        Agent::new("Triage")
            .instructions("Route the user.")
            .tool(weather_tool())
            .handoff(b)
            .provider(provider.clone()),
    );

    Runner::run(&agent, "hi", RunConfig::default()).await.unwrap();

    let request = &provider.requests()[0];
    let system = &request.messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.starts_with("You are Triage."));
    assert!(system.content.contains("Route the user."));
    assert!(system.content.contains("weather: Look up current weather for a city."));
    assert!(system.content.contains("Billing"));
    assert!(system.content.contains("HANDOFF: <agent_name>"));

    // Tool definitions include the handoff transfer tool.
    let names: Vec<&str> = request
        .tools
        .as_ref()
        .unwrap()
        .iter()
        .map(|t| t.name())
        .collect();
    assert!(names.contains(&"weather"));
    assert!(names.contains(&"transfer_to_billing"));
}

#[tokio::test]
async fn toolless_agent_omits_tool_definitions() {
    let provider = Arc::new(MockProvider::new().then_text("ok"));
    let agent = Arc::new(Agent::new("Bare").provider(provider.clone()));

    Runner::run(&agent, "hi", RunConfig::default()).await.unwrap();
    assert!(provider.requests()[0].tools.is_none());
}

#[tokio::test]
async fn tracing_disabled_records_no_spans() {
    let provider = Arc::new(MockProvider::new().then_text("ok"));
    let agent = Arc::new(Agent::new("Quiet").provider(provider));
    let (config, trace_id) = traced_config();
    let config = RunConfig {
        tracing_disabled: true,
        ..config
    };

    Runner::run(&agent, "hi", config).await.unwrap();
    assert!(spans_for(&trace_id).is_empty());
}

#[tokio::test]
async fn conversation_prefix_input_is_preserved() {
    let provider = Arc::new(MockProvider::new().then_text("continuing"));
    let agent = Arc::new(Agent::new("Echo").provider(provider));

    let prefix = vec![
        Message::user("first question"),
        Message::assistant("first answer"),
        Message::user("follow-up"),
    ];
    let result = Runner::run(&agent, prefix, RunConfig::default()).await.unwrap();

    assert_eq!(result.messages.len(), 4);
    assert_eq!(result.messages[1].content, "first answer");
    assert_eq!(result.messages[3].content, "continuing");
}
