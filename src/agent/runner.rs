//! Runner — the outer run loop.
//!
//! The [`Runner`] drives an [`Agent`] until a terminal output:
//!
//! 1. Check the cooperative stop flag and the turn budget
//! 2. Execute one turn via the turn executor
//! 3. On handoff: switch agents and reset the turn counter
//! 4. On a terminal turn: finish the trace and return the result
//! 5. Otherwise count the turn and loop
//!
//! Each agent gets its own turn budget; resetting the counter on handoff
//! prevents earlier agents' turns from starving the successor.
//!
//! `Runner` owns no state — everything mutable lives in [`RunState`], so
//! concurrent runs of the same agent cannot interfere.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use futures::StreamExt as _;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span};

use super::Agent;
use super::hook::HookPair;
use super::result::{RunConfig, RunError, RunEvent, RunResult, UserInput};
use super::turn::TurnExecutor;
use crate::chat::ModelProvider;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::hooks::{NoopRunHooks, RunHooks};
use crate::message::Message;
use crate::stream::{ChunkAggregator, EventBridge};
use crate::trace::{SpanKind, TraceContext};

/// Per-run mutable state: the active agent, the run context, and the trace.
struct RunState {
    current: Arc<Agent>,
    ctx: RunContext,
    trace: TraceContext,
}

impl RunState {
    fn init(agent: &Arc<Agent>, input: UserInput, config: &RunConfig) -> Result<Self> {
        validate_handoff_graph(agent)?;

        let trace = if config.tracing_disabled {
            TraceContext::disabled()
        } else {
            TraceContext::start(
                config.workflow_name(),
                config.trace_id.clone(),
                config.group_id.clone(),
                config.metadata.clone(),
            )
        };

        let mut ctx = RunContext::new(
            input.into_messages(),
            config.metadata.clone(),
            config.stop_token.clone().unwrap_or_default(),
        );
        ctx.set_trace_ids(trace.trace_id().map(str::to_owned), config.group_id.clone());
        ctx.set_agent_name(agent.name());

        Ok(Self {
            current: Arc::clone(agent),
            ctx,
            trace,
        })
    }

    /// Resolve the provider for the active agent: the agent's own, falling
    /// back to the run-wide default.
    fn provider(&self, config: &RunConfig) -> Result<Arc<dyn ModelProvider>> {
        self.current
            .model_provider()
            .or_else(|| config.provider.clone())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "agent '{}' has no provider configured",
                    self.current.name()
                ))
            })
    }

    /// The effective turn budget: the minimum of the run-level cap and the
    /// active agent's own budget.
    fn effective_max_turns(&self, config: &RunConfig) -> usize {
        config
            .max_turns
            .map_or(self.current.turn_budget(), |cap| {
                cap.min(self.current.turn_budget())
            })
    }

    /// Observe the cooperative stop flag before a turn.
    fn check_stop(&mut self) -> Result<()> {
        if self.ctx.is_stopped() {
            self.ctx
                .push_message(Message::assistant("Execution stopped by user request."));
            return Err(Error::ExecutionStopped);
        }
        Ok(())
    }

    fn switch_to(&mut self, target: Arc<Agent>) {
        self.ctx.reset_turns();
        self.current = target;
        self.ctx.set_agent_name(self.current.name());
    }

    fn into_result(mut self, final_output: Value) -> RunResult {
        self.trace.finish();
        RunResult {
            last_agent: self.current.name().to_owned(),
            turns: self.ctx.turn(),
            final_output,
            usage: *self.ctx.usage(),
            messages: self.ctx.take_messages(),
        }
    }

    fn into_failure(self, error: Error) -> RunError {
        let last_agent = self.current.name().to_owned();
        let turns = self.ctx.turn();
        RunError {
            error,
            messages: self.ctx.take_messages(),
            last_agent,
            turns,
        }
    }
}

/// Stateless execution engine driving agents through their turn loop.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Execute a run to completion.
    ///
    /// `input` is either a string (coerced to a single user message) or a
    /// conversation prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] pairing the fatal [`Error`] with the partial
    /// conversation, the last active agent, and the turn counter.
    pub async fn run(
        agent: &Arc<Agent>,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> std::result::Result<RunResult, RunError> {
        let input = input.into();
        let span = info_span!(
            "run",
            agent.name = %agent.name(),
            workflow = %config.workflow_name(),
        );

        async move {
            let mut state = match RunState::init(agent, input, &config) {
                Ok(state) => state,
                Err(e) => return Err(RunError::bare(e)),
            };

            match Self::drive(&mut state, &config).await {
                Ok(final_output) => Ok(state.into_result(final_output)),
                Err(e) => {
                    Self::record_failure(&mut state, &config, &e).await;
                    Err(state.into_failure(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The blocking outer loop; returns the terminal output value.
    async fn drive(state: &mut RunState, config: &RunConfig) -> Result<Value> {
        let noop = NoopRunHooks;

        loop {
            state.check_stop()?;

            let max_turns = state.effective_max_turns(config);
            if state.ctx.turn() >= max_turns {
                return Err(Error::MaxTurnsExceeded(max_turns));
            }

            let current = Arc::clone(&state.current);
            let provider = state.provider(config)?;
            let agent_hooks = current.agent_hooks();
            let run_hooks: &dyn RunHooks = config.hooks.as_deref().unwrap_or(&noop);
            let hooks = HookPair::new(run_hooks, agent_hooks.as_deref(), current.name());

            debug!(agent = current.name(), turn = state.ctx.turn(), "starting turn");

            let outcome = TurnExecutor::execute(
                &current,
                provider.as_ref(),
                config,
                &mut state.ctx,
                &mut state.trace,
                &hooks,
            )
            .await?;

            state.ctx.advance_turn();

            if let Some(handoff) = outcome.handoff {
                info!(
                    from = current.name(),
                    to = handoff.target.name(),
                    "control handed off",
                );
                state.switch_to(handoff.target);
                continue;
            }

            if outcome.terminal {
                info!(
                    agent = current.name(),
                    turns = state.ctx.turn(),
                    tokens = state.ctx.usage().total_tokens,
                    "run completed",
                );
                return Ok(outcome.final_output);
            }
        }
    }

    /// Execute a run with streaming output.
    ///
    /// Yields [`RunEvent`]s: run/turn lifecycle, the bridge's `response.*`
    /// events for each in-flight model call, completed tool calls, handoffs,
    /// and finally the full result. Fatal errors end the stream with an
    /// [`Error`] item.
    pub fn run_streamed(
        agent: &Arc<Agent>,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send>> {
        let agent = Arc::clone(agent);
        let input = input.into();
        let mut config = config;
        config.stream = true;

        Box::pin(async_stream::try_stream! {
            let noop = NoopRunHooks;
            let mut state = RunState::init(&agent, input, &config)?;

            yield RunEvent::RunStarted {
                agent_name: state.current.name().to_owned(),
            };

            loop {
                if let Err(e) = state.check_stop() {
                    Self::record_failure(&mut state, &config, &e).await;
                    Err(e)?;
                }

                let max_turns = state.effective_max_turns(&config);
                if state.ctx.turn() >= max_turns {
                    let e = Error::MaxTurnsExceeded(max_turns);
                    Self::record_failure(&mut state, &config, &e).await;
                    Err(e)?;
                }

                let current = Arc::clone(&state.current);
                let provider = state.provider(&config)?;
                let agent_hooks = current.agent_hooks();
                let run_hooks: &dyn RunHooks = config.hooks.as_deref().unwrap_or(&noop);
                let hooks = HookPair::new(run_hooks, agent_hooks.as_deref(), current.name());

                yield RunEvent::TurnStarted {
                    agent_name: current.name().to_owned(),
                    turn: state.ctx.turn(),
                };

                let mut turn = match TurnExecutor::begin(
                    &current,
                    &config,
                    &mut state.ctx,
                    &mut state.trace,
                    &hooks,
                )
                .await
                {
                    Ok(turn) => turn,
                    Err(e) => {
                        Self::record_failure(&mut state, &config, &e).await;
                        Err(e)?
                    }
                };
                turn.request.stream = true;

                // Drive the provider stream, yielding bridge events as each
                // chunk arrives and aggregating the complete response.
                let mut bridge = EventBridge::new();
                let mut aggregator = ChunkAggregator::new();
                let mut stream_error: Option<Error> = None;

                match provider.stream(&turn.request).await {
                    Ok(mut chunks) => {
                        while let Some(next) = chunks.next().await {
                            match next {
                                Ok(chunk) => {
                                    for event in bridge.push(&chunk) {
                                        yield RunEvent::Stream(event);
                                    }
                                    aggregator.apply(&chunk);
                                }
                                Err(e) => {
                                    stream_error = Some(e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => stream_error = Some(e),
                }

                if let Some(e) = stream_error {
                    TurnExecutor::abort(turn, &mut state.trace, &e);
                    Self::record_failure(&mut state, &config, &e).await;
                    Err(e)?;
                    unreachable!("stream error already propagated");
                }

                for event in bridge.finish() {
                    yield RunEvent::Stream(event);
                }

                let response = aggregator.into_response();
                let outcome = match TurnExecutor::finish(
                    turn,
                    response,
                    &current,
                    &config,
                    &mut state.ctx,
                    &mut state.trace,
                    &hooks,
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        Self::record_failure(&mut state, &config, &e).await;
                        Err(e)?
                    }
                };

                for record in &outcome.records {
                    yield RunEvent::ToolCallCompleted {
                        record: record.clone(),
                    };
                }

                state.ctx.advance_turn();

                if let Some(handoff) = outcome.handoff {
                    yield RunEvent::Handoff {
                        from: current.name().to_owned(),
                        to: handoff.target.name().to_owned(),
                    };
                    state.switch_to(handoff.target);
                    continue;
                }

                if outcome.terminal {
                    let result = state.into_result(outcome.final_output);
                    yield RunEvent::RunCompleted {
                        result: Box::new(result),
                    };
                    return;
                }

                yield RunEvent::TurnCompleted {
                    agent_name: current.name().to_owned(),
                    turn: state.ctx.turn(),
                };
            }
        })
    }

    /// Record a fatal failure: an error span for failures that happen
    /// between turns, the `on_error` hooks, and a clean trace termination.
    async fn record_failure(state: &mut RunState, config: &RunConfig, error: &Error) {
        // In-turn failures already recorded their exception on the agent
        // span; between-turn failures get a dedicated span so the trace's
        // final span carries the error.
        if matches!(
            error,
            Error::MaxTurnsExceeded(_) | Error::ExecutionStopped | Error::Configuration(_)
        ) {
            state.trace.start_span("run.error", SpanKind::Custom);
            state.trace.record_exception(error.to_string());
            state.trace.end_span();
        }

        error!(error = %error, agent = state.current.name(), "run failed");

        let noop = NoopRunHooks;
        let run_hooks: &dyn RunHooks = config.hooks.as_deref().unwrap_or(&noop);
        let agent_hooks = state.current.agent_hooks();
        let hooks = HookPair::new(run_hooks, agent_hooks.as_deref(), state.current.name());
        hooks.error(&state.ctx, error).await;

        state.trace.finish();
    }
}

/// Validate the reachable handoff graph: agent names are identity keys, so
/// two distinct agents sharing a name is fatal, and every visited agent's
/// tool list must satisfy name uniqueness.
fn validate_handoff_graph(root: &Arc<Agent>) -> Result<()> {
    let mut by_name: HashMap<String, Arc<Agent>> = HashMap::new();
    let mut visited: Vec<Arc<Agent>> = Vec::new();
    let mut queue = vec![Arc::clone(root)];

    while let Some(agent) = queue.pop() {
        if visited.iter().any(|seen| Arc::ptr_eq(seen, &agent)) {
            continue;
        }
        visited.push(Arc::clone(&agent));

        agent.validate_tools()?;

        if let Some(existing) = by_name.get(agent.name()) {
            if !Arc::ptr_eq(existing, &agent) {
                return Err(Error::configuration(format!(
                    "handoff graph contains two distinct agents named '{}'",
                    agent.name()
                )));
            }
        } else {
            by_name.insert(agent.name().to_owned(), Arc::clone(&agent));
        }

        queue.extend(agent.handoffs());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_validation_accepts_cycles() {
        let a = Arc::new(Agent::new("A"));
        let b = Arc::new(Agent::new("B").handoff(Arc::clone(&a)));
        a.add_handoff(Arc::clone(&b));

        assert!(validate_handoff_graph(&a).is_ok());
    }

    #[test]
    fn graph_validation_rejects_duplicate_names() {
        let impostor = Arc::new(Agent::new("B"));
        let real = Arc::new(Agent::new("B"));
        let root = Arc::new(Agent::new("A").handoff(real).handoff(impostor));

        let err = validate_handoff_graph(&root).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn graph_validation_allows_shared_instance() {
        let shared = Arc::new(Agent::new("Shared"));
        let left = Arc::new(Agent::new("Left").handoff(Arc::clone(&shared)));
        let right = Arc::new(Agent::new("Right").handoff(Arc::clone(&shared)));
        let root = Arc::new(Agent::new("Root").handoff(left).handoff(right));

        assert!(validate_handoff_graph(&root).is_ok());
    }
}
