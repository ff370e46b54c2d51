//! Hook dispatch bridge for the execution engine.
//!
//! [`HookPair`] combines run-level [`RunHooks`] and per-agent [`AgentHooks`]
//! into a single dispatcher, firing both layers concurrently via
//! `tokio::join!`.

use serde_json::Value;

use crate::context::RunContext;
use crate::error::Error;
use crate::hooks::{AgentHooks, RunHooks};

/// Dispatches lifecycle events to both run-level and agent-level hooks.
pub(super) struct HookPair<'a> {
    run: &'a dyn RunHooks,
    agent: Option<&'a dyn AgentHooks>,
    name: &'a str,
}

impl<'a> HookPair<'a> {
    /// Create a hook pair for the named agent.
    pub fn new(run: &'a dyn RunHooks, agent: Option<&'a dyn AgentHooks>, name: &'a str) -> Self {
        Self { run, agent, name }
    }

    pub async fn agent_start(&self, ctx: &RunContext) {
        if let Some(ah) = self.agent {
            tokio::join!(self.run.on_agent_start(ctx, self.name), ah.on_start(ctx));
        } else {
            self.run.on_agent_start(ctx, self.name).await;
        }
    }

    pub async fn agent_end(&self, ctx: &RunContext, output: &str) {
        if let Some(ah) = self.agent {
            tokio::join!(
                self.run.on_agent_end(ctx, self.name, output),
                ah.on_end(ctx, output)
            );
        } else {
            self.run.on_agent_end(ctx, self.name, output).await;
        }
    }

    pub async fn handoff(&self, ctx: &RunContext, to_agent: &str) {
        if let Some(ah) = self.agent {
            tokio::join!(
                self.run.on_handoff(ctx, self.name, to_agent),
                ah.on_handoff(ctx, to_agent)
            );
        } else {
            self.run.on_handoff(ctx, self.name, to_agent).await;
        }
    }

    pub async fn tool_start(&self, ctx: &RunContext, tool_name: &str, args: &Value) {
        if let Some(ah) = self.agent {
            tokio::join!(
                self.run.on_tool_start(ctx, self.name, tool_name, args),
                ah.on_tool_start(ctx, tool_name, args)
            );
        } else {
            self.run.on_tool_start(ctx, self.name, tool_name, args).await;
        }
    }

    pub async fn tool_end(&self, ctx: &RunContext, tool_name: &str, result: &str) {
        if let Some(ah) = self.agent {
            tokio::join!(
                self.run.on_tool_end(ctx, self.name, tool_name, result),
                ah.on_tool_end(ctx, tool_name, result)
            );
        } else {
            self.run.on_tool_end(ctx, self.name, tool_name, result).await;
        }
    }

    pub async fn error(&self, ctx: &RunContext, err: &Error) {
        if let Some(ah) = self.agent {
            tokio::join!(self.run.on_error(ctx, self.name, err), ah.on_error(ctx, err));
        } else {
            self.run.on_error(ctx, self.name, err).await;
        }
    }
}
