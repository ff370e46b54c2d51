//! Agents and the execution engine that drives them.
//!
//! An [`Agent`] bundles instructions, tools, handoff targets, an optional
//! structured-output schema, lifecycle hooks, and guardrails. The
//! [`Runner`] drives an agent through its turn loop:
//!
//! 1. Build a prompt from instructions + conversation history
//! 2. Call the model with available tool definitions
//! 3. Parse the response; dispatch tool calls in provider order
//! 4. Detect handoffs and transfer control, resetting the turn budget
//! 5. Loop until a terminal output, a tripwire, or the turn budget
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsuru::prelude::*;
//!
//! let billing = Arc::new(
//!     Agent::new("Billing")
//!         .instructions("Handle billing questions.")
//!         .provider(provider.clone()),
//! );
//! let triage = Arc::new(
//!     Agent::new("Triage")
//!         .instructions("Route the user to the right agent.")
//!         .handoff(Arc::clone(&billing))
//!         .provider(provider),
//! );
//!
//! let result = Runner::run(&triage, "I was double charged", RunConfig::default()).await?;
//! println!("{}", result.final_output);
//! ```

mod dispatch;
mod handoff;
mod hook;
mod result;
mod runner;
mod turn;

pub use handoff::{Handoff, handoff_tool_name, slugify};
pub use result::{RunConfig, RunError, RunEvent, RunResult, ToolCallRecord, UserInput};
pub use runner::Runner;

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::chat::{ResponseFormat, generate_json_schema};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::hooks::AgentHooks;
use crate::tool::Tool;

/// Default model identifier for agents that do not set one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default per-agent turn budget.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// System instructions for an agent: a literal string or a callable
/// resolved once per turn during prompt build.
#[derive(Clone)]
pub enum Instructions {
    /// A fixed instruction string.
    Static(String),
    /// Instructions computed from the run context and agent.
    Dynamic(Arc<dyn Fn(&RunContext, &Agent) -> String + Send + Sync>),
}

impl Instructions {
    /// Resolve to a concrete string for this turn.
    #[must_use]
    pub fn resolve(&self, ctx: &RunContext, agent: &Agent) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Dynamic(f) => f(ctx, agent),
        }
    }
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Self::Static(text.to_owned())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

/// Structured-output descriptor for an agent.
///
/// Sent to the provider as a strict JSON schema response format; the turn
/// executor parses and shallowly validates the assistant content against it.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    /// Create a schema from a name and raw JSON Schema value.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Derive the schema from a Rust type implementing
    /// [`schemars::JsonSchema`].
    #[must_use]
    pub fn from_type<T: schemars::JsonSchema>() -> Self {
        let (name, schema) = generate_json_schema::<T>();
        Self { name, schema }
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw JSON Schema.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// The provider-facing response format.
    #[must_use]
    pub fn to_response_format(&self) -> ResponseFormat {
        ResponseFormat::json_schema(self.name.clone(), self.schema.clone())
    }

    /// Shallow structural validation: the value must be an object when the
    /// schema declares one, and must contain every `required` property.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        if self.schema.get("type").and_then(Value::as_str) == Some("object") {
            let Some(object) = value.as_object() else {
                return Err("expected a JSON object".to_owned());
            };
            let required = self
                .schema
                .get("required")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    return Err(format!("missing required property '{key}'"));
                }
            }
        }
        Ok(())
    }
}

/// A named configuration of instructions, tools, handoffs, and hooks.
///
/// Read-mostly after construction. The explicit setters
/// ([`add_tool`](Self::add_tool), [`add_handoff`](Self::add_handoff)) work
/// through a shared `Arc<Agent>`, which is also how handoff cycles are
/// built; they are not safe to call while a run using this agent is in
/// flight.
pub struct Agent {
    name: String,
    instructions: Option<Instructions>,
    model: String,
    max_turns: usize,
    tools: RwLock<Vec<Tool>>,
    handoffs: RwLock<Vec<Arc<Agent>>>,
    output_schema: Option<OutputSchema>,
    hooks: Option<Arc<dyn AgentHooks>>,
    input_guardrails: Vec<InputGuardrail>,
    output_guardrails: Vec<OutputGuardrail>,
    provider: Option<Arc<dyn crate::chat::ModelProvider>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("max_turns", &self.max_turns)
            .field("tools", &self.tool_names())
            .field("handoffs", &self.handoff_names())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent with the given name.
    ///
    /// The name is the agent's identity key for handoff resolution: two
    /// agents reachable in one handoff graph may share a name only if they
    /// are the same object.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            model: DEFAULT_MODEL.to_owned(),
            max_turns: DEFAULT_MAX_TURNS,
            tools: RwLock::new(Vec::new()),
            handoffs: RwLock::new(Vec::new()),
            output_schema: None,
            hooks: None,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            provider: None,
        }
    }

    /// Set the system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set dynamic instructions resolved once per turn.
    #[must_use]
    pub fn dynamic_instructions(
        mut self,
        f: impl Fn(&RunContext, &Agent) -> String + Send + Sync + 'static,
    ) -> Self {
        self.instructions = Some(Instructions::Dynamic(Arc::new(f)));
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-agent turn budget.
    #[must_use]
    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Add a tool. Duplicate function-tool names are caught at run start.
    #[must_use]
    pub fn tool(self, tool: impl Into<Tool>) -> Self {
        if let Ok(mut tools) = self.tools.write() {
            tools.push(tool.into());
        }
        self
    }

    /// Add a handoff target.
    #[must_use]
    pub fn handoff(self, target: Arc<Agent>) -> Self {
        if let Ok(mut handoffs) = self.handoffs.write() {
            handoffs.push(target);
        }
        self
    }

    /// Set the structured-output schema.
    #[must_use]
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Attach per-agent lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl AgentHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Add an input guardrail.
    #[must_use]
    pub fn input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Add an output guardrail.
    #[must_use]
    pub fn output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Set the model provider used for this agent's turns.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn crate::chat::ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    // -- operations ---------------------------------------------------------

    /// The agent's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's model identifier.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model
    }

    /// The per-agent turn budget.
    #[must_use]
    pub const fn turn_budget(&self) -> usize {
        self.max_turns
    }

    /// The structured-output schema, when set.
    #[must_use]
    pub const fn schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Per-agent hooks, when set.
    #[must_use]
    pub fn agent_hooks(&self) -> Option<Arc<dyn AgentHooks>> {
        self.hooks.clone()
    }

    /// Per-agent input guardrails.
    #[must_use]
    pub fn input_guardrails(&self) -> &[InputGuardrail] {
        &self.input_guardrails
    }

    /// Per-agent output guardrails.
    #[must_use]
    pub fn output_guardrails(&self) -> &[OutputGuardrail] {
        &self.output_guardrails
    }

    /// The configured provider, when set.
    #[must_use]
    pub fn model_provider(&self) -> Option<Arc<dyn crate::chat::ModelProvider>> {
        self.provider.clone()
    }

    /// Add a tool after construction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a function tool with the same
    /// name already exists on this agent.
    pub fn add_tool(&self, tool: impl Into<Tool>) -> Result<()> {
        let tool = tool.into();
        let mut tools = self
            .tools
            .write()
            .map_err(|_| Error::configuration("agent tool list poisoned"))?;
        if tools.iter().any(|t| t.name() == tool.name()) {
            return Err(Error::configuration(format!(
                "agent '{}' already has a tool named '{}'",
                self.name,
                tool.name()
            )));
        }
        tools.push(tool);
        Ok(())
    }

    /// Add a handoff target after construction.
    pub fn add_handoff(&self, target: Arc<Agent>) {
        if let Ok(mut handoffs) = self.handoffs.write() {
            handoffs.push(target);
        }
    }

    /// Whether this agent can hand off to the named agent.
    #[must_use]
    pub fn can_handoff_to(&self, name: &str) -> bool {
        self.find_handoff(name).is_some()
    }

    /// Resolve a handoff target by name.
    #[must_use]
    pub fn find_handoff(&self, name: &str) -> Option<Arc<Agent>> {
        self.handoffs
            .read()
            .ok()?
            .iter()
            .find(|a| a.name == name)
            .map(Arc::clone)
    }

    /// Execute a tool by exact name match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when no function tool matches `name`
    /// (hosted tools are not locally executable); otherwise propagates the
    /// handler's result.
    pub async fn execute_tool(&self, name: &str, args: Value) -> Result<Value> {
        let tools = self.tools();
        crate::tool::invoke_by_name(&tools, name, args).await
    }

    /// Resolve the instructions for this turn, if any are set.
    #[must_use]
    pub fn resolve_instructions(&self, ctx: &RunContext) -> Option<String> {
        self.instructions.as_ref().map(|i| i.resolve(ctx, self))
    }

    /// Whether this agent exposes any tools.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        self.tools.read().is_ok_and(|t| !t.is_empty())
    }

    /// Snapshot of the tool list.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.read().map(|t| t.clone()).unwrap_or_default()
    }

    /// Snapshot of the handoff targets.
    #[must_use]
    pub fn handoffs(&self) -> Vec<Arc<Agent>> {
        self.handoffs.read().map(|h| h.clone()).unwrap_or_default()
    }

    /// Names of the agent's tools, in registration order.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools()
            .iter()
            .map(|t| t.name().to_owned())
            .collect()
    }

    /// Names of the agent's handoff targets, in registration order.
    #[must_use]
    pub fn handoff_names(&self) -> Vec<String> {
        self.handoffs().iter().map(|a| a.name.clone()).collect()
    }

    /// Function tool names must be unique within one agent.
    pub(crate) fn validate_tools(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tool in self.tools() {
            if tool.as_function().is_some() && !seen.insert(tool.name().to_owned()) {
                return Err(Error::configuration(format!(
                    "agent '{}' has duplicate tool name '{}'",
                    self.name,
                    tool.name()
                )));
            }
        }
        Ok(())
    }
}
