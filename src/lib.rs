//! Tsuru is a multi-agent orchestration runtime for LLM-powered
//! applications.
//!
//! The runtime drives multi-turn conversations with a language model,
//! dispatches model-requested tool invocations, and transfers control
//! between named agents ("handoffs") until a terminal output is produced —
//! under a bounded turn budget, with tripwire guardrails, lifecycle hooks,
//! and hierarchical tracing.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsuru::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = Arc::new(OpenAiProvider::from_env()?);
//!     let agent = Arc::new(
//!         Agent::new("Assistant")
//!             .instructions("You are a helpful assistant.")
//!             .provider(provider),
//!     );
//!
//!     let result = Runner::run(&agent, "ping", RunConfig::default()).await?;
//!     println!("{}", result.final_text());
//!     Ok(())
//! }
//! ```

// Core data model
pub mod chat;
pub mod context;
pub mod error;
pub mod message;
pub mod usage;

// Capabilities
pub mod guardrail;
pub mod hooks;
pub mod tool;

// Execution engine
pub mod agent;
pub mod stream;
pub mod trace;

// Collaborators
pub mod providers;
pub mod telemetry;

pub mod prelude;

pub use agent::{
    Agent, Handoff, Instructions, OutputSchema, RunConfig, RunError, RunResult, Runner, UserInput,
};
pub use chat::{ChatRequest, ChatResponse, ModelProvider};
pub use context::{RunContext, StopToken};
pub use error::{Error, Result};
pub use guardrail::{GuardrailOutput, InputGuardrail, OutputGuardrail};
pub use hooks::{AgentHooks, RunHooks};
pub use message::{Message, Role, ToolCall};
pub use tool::{FunctionTool, HostedTool, Tool};
pub use trace::{Span, SpanKind, SpanProcessor, Trace, TraceContext};
pub use usage::Usage;
