//! Per-run context shared with hooks and guardrails.
//!
//! [`RunContext`] is the mutable bag carried through an entire run: the
//! conversation, run metadata, trace identifiers, the active agent, the
//! per-agent turn counter, cumulative usage, and a key-value store for
//! user-defined data. It is owned exclusively by its run; hooks and
//! guardrails observe it by shared reference. Only the executor advances the
//! turn counter and the active agent.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::message::{Message, Role};
use crate::usage::Usage;

/// Cooperative cancellation flag for a run.
///
/// Clone the token, pass one copy in
/// [`RunConfig`](crate::agent::RunConfig), and call [`StopToken::stop`] from
/// anywhere. The runner observes the flag before each turn; tool invocations
/// already in flight are allowed to complete.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Create an unset stop token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop before its next turn.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state carried through an entire agent run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    messages: Vec<Message>,
    metadata: HashMap<String, Value>,
    trace_id: Option<String>,
    group_id: Option<String>,
    agent_name: String,
    turn: usize,
    usage: Usage,
    state: HashMap<String, Value>,
    stop: StopToken,
}

impl RunContext {
    /// Create a context seeded with an initial conversation.
    #[must_use]
    pub fn new(messages: Vec<Message>, metadata: HashMap<String, Value>, stop: StopToken) -> Self {
        Self {
            messages,
            metadata,
            stop,
            ..Self::default()
        }
    }

    /// The conversation so far. Append-only within a run.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent user message content, if any.
    #[must_use]
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The most recent assistant message content, if any.
    #[must_use]
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Run-wide metadata.
    #[must_use]
    pub const fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// The active trace id, when tracing is enabled.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// The trace group id, when one was configured.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    /// Name of the currently active agent.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Turn counter for the currently active agent. Monotonically
    /// non-decreasing within one agent assignment; reset to zero on handoff.
    #[must_use]
    pub const fn turn(&self) -> usize {
        self.turn
    }

    /// Cumulative token usage across all model calls in this run.
    #[must_use]
    pub const fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Get a value from the user-defined state.
    #[must_use]
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Insert a value into the user-defined state.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Whether a cooperative stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn set_trace_ids(&mut self, trace_id: Option<String>, group_id: Option<String>) {
        self.trace_id = trace_id;
        self.group_id = group_id;
    }

    pub(crate) fn set_agent_name(&mut self, name: impl Into<String>) {
        self.agent_name = name.into();
    }

    pub(crate) const fn advance_turn(&mut self) {
        self.turn += 1;
    }

    pub(crate) const fn reset_turns(&mut self) {
        self.turn = 0;
    }

    pub(crate) fn add_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    pub(crate) fn take_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_content_finds_most_recent() {
        let mut ctx = RunContext::default();
        ctx.push_message(Message::user("first"));
        ctx.push_message(Message::assistant("reply"));
        ctx.push_message(Message::user("second"));

        assert_eq!(ctx.last_user_content(), Some("second"));
        assert_eq!(ctx.last_assistant_content(), Some("reply"));
    }

    #[test]
    fn turn_counter_advances_and_resets() {
        let mut ctx = RunContext::default();
        ctx.advance_turn();
        ctx.advance_turn();
        assert_eq!(ctx.turn(), 2);
        ctx.reset_turns();
        assert_eq!(ctx.turn(), 0);
    }

    #[test]
    fn stop_token_is_shared() {
        let token = StopToken::new();
        let ctx = RunContext::new(Vec::new(), HashMap::new(), token.clone());
        assert!(!ctx.is_stopped());
        token.stop();
        assert!(ctx.is_stopped());
    }

    #[test]
    fn state_round_trips() {
        let mut ctx = RunContext::default();
        ctx.set_state("k", serde_json::json!(42));
        assert_eq!(ctx.get_state("k"), Some(&serde_json::json!(42)));
        assert!(ctx.get_state("missing").is_none());
    }
}
