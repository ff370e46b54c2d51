//! Lifecycle hooks for observing agent runs.
//!
//! Two async trait hierarchies, both with default no-op methods so listeners
//! only override the events they care about:
//!
//! - [`RunHooks`]: run-level hooks that observe **all** agents in a run.
//!   Every method receives the agent name.
//! - [`AgentHooks`]: per-agent hooks bound to a specific
//!   [`Agent`](crate::agent::Agent) instance; the agent is implicit.
//!
//! # Lifecycle Events
//!
//! 1. `on_agent_start` — a turn begins for the active agent
//! 2. `on_tool_start` / `on_tool_end` — around each dispatched tool call
//! 3. `on_handoff` — control transfers to another agent
//! 4. `on_agent_end` — the run produced its final output
//! 5. `on_error` — a fatal error ends the run

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::Error;

/// A shared, thread-safe [`RunHooks`] trait object.
pub type SharedRunHooks = Arc<dyn RunHooks>;

/// A shared, thread-safe [`AgentHooks`] trait object.
pub type SharedAgentHooks = Arc<dyn AgentHooks>;

/// Run-level lifecycle hooks, observing all agents in a run.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called at the start of each turn for the active agent.
    async fn on_agent_start(&self, _ctx: &RunContext, _agent_name: &str) {}

    /// Called once when the run produces its final output.
    async fn on_agent_end(&self, _ctx: &RunContext, _agent_name: &str, _output: &str) {}

    /// Called when control is handed off from one agent to another.
    async fn on_handoff(&self, _ctx: &RunContext, _from_agent: &str, _to_agent: &str) {}

    /// Called immediately before a tool is invoked.
    async fn on_tool_start(&self, _ctx: &RunContext, _agent_name: &str, _tool_name: &str, _args: &Value) {
    }

    /// Called immediately after a tool completes successfully.
    async fn on_tool_end(&self, _ctx: &RunContext, _agent_name: &str, _tool_name: &str, _result: &str) {
    }

    /// Called when a fatal error ends the run.
    async fn on_error(&self, _ctx: &RunContext, _agent_name: &str, _error: &Error) {}
}

/// Per-agent lifecycle hooks.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called at the start of each turn this agent executes.
    async fn on_start(&self, _ctx: &RunContext) {}

    /// Called when this agent produces the run's final output.
    async fn on_end(&self, _ctx: &RunContext, _output: &str) {}

    /// Called when this agent hands off control to another agent.
    async fn on_handoff(&self, _ctx: &RunContext, _to_agent: &str) {}

    /// Called immediately before this agent invokes a tool.
    async fn on_tool_start(&self, _ctx: &RunContext, _tool_name: &str, _args: &Value) {}

    /// Called immediately after a tool completes for this agent.
    async fn on_tool_end(&self, _ctx: &RunContext, _tool_name: &str, _result: &str) {}

    /// Called when a fatal error ends the run during this agent's turn.
    async fn on_error(&self, _ctx: &RunContext, _error: &Error) {}
}

/// A [`RunHooks`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunHooks;

#[async_trait]
impl RunHooks for NoopRunHooks {}

/// An [`AgentHooks`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAgentHooks;

#[async_trait]
impl AgentHooks for NoopAgentHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        ends: AtomicUsize,
        handoffs: AtomicUsize,
    }

    #[async_trait]
    impl RunHooks for Counting {
        async fn on_agent_start(&self, _ctx: &RunContext, _agent_name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_agent_end(&self, _ctx: &RunContext, _agent_name: &str, _output: &str) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_handoff(&self, _ctx: &RunContext, _from: &str, _to: &str) {
            self.handoffs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn overridden_methods_fire() {
        let hooks = Counting::default();
        let ctx = RunContext::default();

        hooks.on_agent_start(&ctx, "a").await;
        hooks.on_agent_start(&ctx, "a").await;
        hooks.on_handoff(&ctx, "a", "b").await;
        hooks.on_agent_end(&ctx, "b", "done").await;

        assert_eq!(hooks.starts.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.handoffs.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn noop_hooks_are_object_safe() {
        let hooks: SharedRunHooks = Arc::new(NoopRunHooks);
        let agent_hooks: SharedAgentHooks = Arc::new(NoopAgentHooks);
        let ctx = RunContext::default();
        hooks.on_agent_start(&ctx, "test").await;
        agent_hooks.on_start(&ctx).await;
    }
}
