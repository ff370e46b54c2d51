//! The turn executor — one model round-trip and its fan-out.
//!
//! A turn is: re-root tracing → hooks → input guardrails → prompt build →
//! model call → response parse → tool fan-out → handoff detection →
//! termination decision → restore tracing. The executor is split into
//! [`TurnExecutor::begin`] and [`TurnExecutor::finish`] around the model
//! call so the streaming runner can yield bridge events mid-turn; the
//! blocking path composes both around [`ModelProvider::complete`].

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::Agent;
use super::dispatch;
use super::handoff::{self, DetectedHandoff};
use super::hook::HookPair;
use super::result::{RunConfig, ToolCallRecord};
use crate::chat::{ChatRequest, ChatResponse, ModelProvider};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::trace::{RootToken, SpanKind, TraceContext};

const REDACTED: &str = "[REDACTED]";

static TERMINAL_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(STOP|TERMINATE|DONE|FINISHED)\b").expect("terminal token pattern is valid")
});

/// Whether the content contains a reserved termination token as a whole word.
pub(super) fn has_terminal_token(content: &str) -> bool {
    TERMINAL_TOKENS.is_match(content)
}

/// A handoff resolved against the current agent's registered targets.
pub(super) struct ResolvedHandoff {
    /// The agent receiving control.
    pub target: Arc<Agent>,
}

/// What one executed turn produced.
pub(super) struct TurnOutcome {
    /// No tool calls, no handoff, or an explicit termination token.
    pub terminal: bool,
    /// A detected and resolved handoff, when one occurred.
    pub handoff: Option<ResolvedHandoff>,
    /// The terminal output value (text, or parsed structured output).
    pub final_output: Value,
    /// Records of the tool calls dispatched this turn.
    pub records: Vec<ToolCallRecord>,
}

/// In-flight turn state between [`TurnExecutor::begin`] and
/// [`TurnExecutor::finish`].
pub(super) struct Turn {
    root: RootToken,
    /// The request to send to the provider.
    pub request: ChatRequest,
    generation_open: bool,
}

/// Executes single turns. Stateless; all per-turn state lives in [`Turn`].
pub(super) struct TurnExecutor;

impl TurnExecutor {
    /// Run a complete blocking turn against the provider.
    pub async fn execute(
        agent: &Arc<Agent>,
        provider: &dyn ModelProvider,
        config: &RunConfig,
        ctx: &mut RunContext,
        trace: &mut TraceContext,
        hooks: &HookPair<'_>,
    ) -> Result<TurnOutcome> {
        let turn = Self::begin(agent, config, ctx, trace, hooks).await?;
        let response = match provider.complete(&turn.request).await {
            Ok(response) => response,
            Err(e) => {
                Self::abort(turn, trace, &e);
                return Err(e);
            }
        };
        Self::finish(turn, response, agent, config, ctx, trace, hooks).await
    }

    /// Steps 1–5 of the turn: re-root tracing, fire start hooks, evaluate
    /// input guardrails, and build the model request.
    pub async fn begin(
        agent: &Arc<Agent>,
        config: &RunConfig,
        ctx: &mut RunContext,
        trace: &mut TraceContext,
        hooks: &HookPair<'_>,
    ) -> Result<Turn> {
        let root = trace.begin_root(format!("agent.{}", agent.name()), SpanKind::Agent);

        match Self::begin_inner(agent, config, ctx, trace, hooks).await {
            Ok(request) => {
                trace.start_span("generation", SpanKind::Generation);
                trace.set_attribute("generation.model", request.model.clone());
                Ok(Turn {
                    root,
                    request,
                    generation_open: true,
                })
            }
            Err(e) => {
                trace.record_exception(e.to_string());
                trace.end_root(root);
                Err(e)
            }
        }
    }

    async fn begin_inner(
        agent: &Arc<Agent>,
        config: &RunConfig,
        ctx: &mut RunContext,
        trace: &mut TraceContext,
        hooks: &HookPair<'_>,
    ) -> Result<ChatRequest> {
        let include_sensitive = config.trace_include_sensitive_data;
        let instructions = agent.resolve_instructions(ctx);

        trace.set_attribute("agent.name", agent.name());
        trace.set_attribute("agent.handoffs", Value::from(agent.handoff_names()));
        trace.set_attribute("agent.tools", Value::from(agent.tool_names()));
        trace.set_attribute(
            "agent.output_type",
            agent.schema().map_or("text", |s| s.name()).to_owned(),
        );
        trace.set_attribute("agent.model", effective_model(agent, config));
        trace.set_attribute(
            "agent.instructions",
            sensitive(instructions.clone().unwrap_or_default(), include_sensitive),
        );
        trace.set_attribute(
            "agent.input",
            sensitive(
                ctx.last_user_content().unwrap_or_default().to_owned(),
                include_sensitive,
            ),
        );

        hooks.agent_start(ctx).await;

        if let Some(content) = ctx.last_user_content().map(str::to_owned) {
            let guardrails: Vec<InputGuardrail> = config
                .input_guardrails
                .iter()
                .chain(agent.input_guardrails())
                .cloned()
                .collect();
            run_input_guardrails(&guardrails, agent, &content, ctx, trace).await?;
        }

        Ok(build_request(agent, config, instructions, ctx))
    }

    /// Steps 6–11 of the turn: parse the response, fan out tool calls,
    /// detect handoffs, decide termination, and restore tracing.
    pub async fn finish(
        turn: Turn,
        response: ChatResponse,
        agent: &Arc<Agent>,
        config: &RunConfig,
        ctx: &mut RunContext,
        trace: &mut TraceContext,
        hooks: &HookPair<'_>,
    ) -> Result<TurnOutcome> {
        let Turn {
            root,
            generation_open,
            ..
        } = turn;

        if generation_open {
            if let Some(usage) = response.usage {
                trace.set_attribute("generation.tokens", usage.to_string());
            }
            trace.end_span();
        }

        match Self::finish_inner(response, agent, config, ctx, trace, hooks).await {
            Ok(outcome) => {
                trace.end_root(root);
                Ok(outcome)
            }
            Err(e) => {
                trace.record_exception(e.to_string());
                trace.end_root(root);
                Err(e)
            }
        }
    }

    async fn finish_inner(
        response: ChatResponse,
        agent: &Arc<Agent>,
        config: &RunConfig,
        ctx: &mut RunContext,
        trace: &mut TraceContext,
        hooks: &HookPair<'_>,
    ) -> Result<TurnOutcome> {
        let include_sensitive = config.trace_include_sensitive_data;

        if let Some(message) = response.error {
            return Err(Error::Provider {
                message,
                status: None,
            });
        }
        if let Some(usage) = response.usage {
            ctx.add_usage(usage);
        }

        let message = response.message;
        let content = message.content.clone();

        let final_output = match agent.schema() {
            Some(schema) => match serde_json::from_str::<Value>(&content) {
                Ok(value) => match schema.validate(&value) {
                    Ok(()) => value,
                    Err(reason) => {
                        warn!(
                            agent = agent.name(),
                            schema = schema.name(),
                            reason,
                            "structured output failed validation; passing raw content through",
                        );
                        Value::String(content.clone())
                    }
                },
                Err(e) => {
                    warn!(
                        agent = agent.name(),
                        schema = schema.name(),
                        error = %e,
                        "structured output is not valid JSON; passing raw content through",
                    );
                    Value::String(content.clone())
                }
            },
            None => Value::String(content.clone()),
        };

        // The assistant message is appended even when content is empty but
        // tool calls are present.
        ctx.push_message(message.clone());

        let detected = handoff::detect(agent, &message);

        let records = dispatch::dispatch(
            message.tool_calls(),
            detected.as_ref(),
            agent,
            ctx,
            trace,
            hooks,
            include_sensitive,
        )
        .await?;

        let resolved = match &detected {
            Some(DetectedHandoff { target_name, .. }) => {
                let target = agent
                    .find_handoff(target_name)
                    .ok_or_else(|| Error::HandoffTargetNotFound(target_name.clone()))?;
                hooks.handoff(ctx, target.name()).await;
                trace.start_span("handoff", SpanKind::Handoff);
                trace.set_attribute("handoff.from", agent.name());
                trace.set_attribute("handoff.to", target.name());
                trace.end_span();
                debug!(from = agent.name(), to = target.name(), "handoff detected");
                Some(ResolvedHandoff { target })
            }
            None => None,
        };

        let terminal = resolved.is_none()
            && (!message.has_tool_calls() || has_terminal_token(&content));

        if terminal {
            let guardrails: Vec<OutputGuardrail> = config
                .output_guardrails
                .iter()
                .chain(agent.output_guardrails())
                .cloned()
                .collect();
            run_output_guardrails(&guardrails, agent, &content, ctx, trace).await?;
        }

        trace.set_attribute("agent.output", sensitive(content.clone(), include_sensitive));
        if let Some(usage) = response.usage {
            trace.set_attribute("agent.tokens", usage.to_string());
        }

        if terminal {
            hooks.agent_end(ctx, &content).await;
        }

        Ok(TurnOutcome {
            terminal,
            handoff: resolved,
            final_output,
            records,
        })
    }

    /// Close the turn's spans after a model-call failure.
    pub fn abort(turn: Turn, trace: &mut TraceContext, error: &Error) {
        let Turn {
            root,
            generation_open,
            ..
        } = turn;
        if generation_open {
            trace.record_exception(error.to_string());
            trace.end_span();
        }
        trace.record_exception(error.to_string());
        trace.end_root(root);
    }
}

fn sensitive(value: String, include: bool) -> String {
    if include { value } else { REDACTED.to_owned() }
}

fn effective_model(agent: &Agent, config: &RunConfig) -> String {
    config
        .model_override
        .clone()
        .unwrap_or_else(|| agent.model_id().to_owned())
}

/// Construct the system message and model request for this turn.
fn build_request(
    agent: &Agent,
    config: &RunConfig,
    instructions: Option<String>,
    ctx: &RunContext,
) -> ChatRequest {
    let mut prompt = format!("You are {}.", agent.name());
    if let Some(instructions) = instructions.filter(|i| !i.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(&instructions);
    }

    let tools = agent.tools();
    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:");
        for tool in &tools {
            prompt.push_str(&format!("\n- {}: {}", tool.name(), tool.description()));
        }
    }

    let handoffs = agent.handoffs();
    if !handoffs.is_empty() {
        prompt.push_str(&format!(
            "\n\nYou can hand off to the following agents: {}.",
            agent.handoff_names().join(", ")
        ));
        prompt.push_str(
            "\nTo handoff to another agent, include 'HANDOFF: <agent_name>' in your response.",
        );
    }

    let mut messages = Vec::with_capacity(ctx.messages().len() + 1);
    messages.push(crate::message::Message::system(prompt));
    messages.extend_from_slice(ctx.messages());

    let mut request = ChatRequest::with_messages(effective_model(agent, config), messages);

    let mut definitions: Vec<_> = tools.iter().map(crate::tool::Tool::definition).collect();
    definitions.extend(handoff::tool_definitions(&handoffs));
    if !definitions.is_empty() {
        request.tools = Some(definitions);
    }

    if let Some(schema) = agent.schema() {
        request.response_format = Some(schema.to_response_format());
    }

    request.temperature = config.temperature;
    request.top_p = config.top_p;
    request.max_tokens = config.max_tokens;
    request.stop = config.stop.clone();
    request.frequency_penalty = config.frequency_penalty;
    request.presence_penalty = config.presence_penalty;
    request.user = config.user.clone();

    request
}

async fn run_input_guardrails(
    guardrails: &[InputGuardrail],
    agent: &Agent,
    content: &str,
    ctx: &RunContext,
    trace: &mut TraceContext,
) -> Result<()> {
    for guardrail in guardrails {
        trace.start_span(format!("guardrail.{}", guardrail.name()), SpanKind::Guardrail);
        let result = guardrail.run(ctx, agent.name(), content).await;
        match &result {
            Ok(outcome) => trace.set_attribute("guardrail.triggered", outcome.is_triggered()),
            Err(e) => trace.record_exception(e.to_string()),
        }
        trace.end_span();

        let outcome = result?;
        if outcome.is_triggered() {
            return Err(Error::input_guardrail(
                outcome.guardrail_name,
                content,
                outcome.output.output_info,
            ));
        }
    }
    Ok(())
}

async fn run_output_guardrails(
    guardrails: &[OutputGuardrail],
    agent: &Agent,
    content: &str,
    ctx: &RunContext,
    trace: &mut TraceContext,
) -> Result<()> {
    for guardrail in guardrails {
        trace.start_span(format!("guardrail.{}", guardrail.name()), SpanKind::Guardrail);
        let result = guardrail.run(ctx, agent.name(), content).await;
        match &result {
            Ok(outcome) => trace.set_attribute("guardrail.triggered", outcome.is_triggered()),
            Err(e) => trace.record_exception(e.to_string()),
        }
        trace.end_span();

        let outcome = result?;
        if outcome.is_triggered() {
            return Err(Error::output_guardrail(
                outcome.guardrail_name,
                content,
                outcome.output.output_info,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_tokens_match_whole_words() {
        assert!(has_terminal_token("We are DONE here."));
        assert!(has_terminal_token("STOP"));
        assert!(has_terminal_token("All tasks FINISHED now"));
        assert!(!has_terminal_token("The work is done"));
        assert!(!has_terminal_token("UNDONE business"));
        assert!(!has_terminal_token("STOPPING by later"));
    }
}
