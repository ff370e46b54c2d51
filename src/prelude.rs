//! Convenience re-exports for the common path.
//!
//! ```rust,ignore
//! use tsuru::prelude::*;
//! ```

pub use crate::agent::{
    Agent, Handoff, Instructions, OutputSchema, RunConfig, RunError, RunEvent, RunResult, Runner,
    UserInput,
};
pub use crate::chat::{ChatChunk, ChatRequest, ChatResponse, ModelProvider};
pub use crate::context::{RunContext, StopToken};
pub use crate::error::{Error, Result};
pub use crate::guardrail::{
    GuardrailOutput, GuardrailResult, InputGuardrail, InputGuardrailCheck, OutputGuardrail,
    OutputGuardrailCheck,
};
pub use crate::hooks::{AgentHooks, NoopAgentHooks, NoopRunHooks, RunHooks};
pub use crate::message::{Message, Role, ToolCall};
pub use crate::providers::{MockProvider, OpenAiProvider};
pub use crate::stream::{EventBridge, StreamEvent};
pub use crate::tool::{FunctionTool, HostedTool, Tool, ToolHandler};
pub use crate::trace::{
    InMemorySpanProcessor, Span, SpanKind, SpanProcessor, SpanStatus, Trace, TraceContext,
};
pub use crate::usage::Usage;
