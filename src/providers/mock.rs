//! Scripted provider for tests and offline development.
//!
//! [`MockProvider`] returns pre-programmed responses in order. Each model
//! call consumes one scripted turn; requests are recorded for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::chat::{ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelProvider};
use crate::error::{Error, Result};
use crate::message::{Message, ToolCall};
use crate::stream::ChunkAggregator;
use crate::usage::Usage;

#[derive(Debug, Clone)]
enum ScriptedTurn {
    Response(Box<ChatResponse>),
    Chunks(Vec<ChatChunk>),
}

/// A [`ModelProvider`] that replays scripted turns.
///
/// ```rust,ignore
/// let provider = Arc::new(
///     MockProvider::new()
///         .then_tool_call("call_1", "weather", r#"{"city":"Paris"}"#)
///         .then_text("Paris: sunny 22"),
/// );
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, turn: ScriptedTurn) -> Self {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push_back(turn);
        }
        self
    }

    /// Script a plain-text assistant response.
    #[must_use]
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(ScriptedTurn::Response(Box::new(ChatResponse::from_text(
            text,
        ))))
    }

    /// Script a full response.
    #[must_use]
    pub fn then_response(self, response: ChatResponse) -> Self {
        self.push(ScriptedTurn::Response(Box::new(response)))
    }

    /// Script an assistant response carrying a single tool call.
    #[must_use]
    pub fn then_tool_call(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        let message =
            Message::assistant_with_tool_calls("", vec![ToolCall::new(id, name, arguments)]);
        self.push(ScriptedTurn::Response(Box::new(ChatResponse::new(message))))
    }

    /// Script an assistant message verbatim.
    #[must_use]
    pub fn then_message(self, message: Message) -> Self {
        self.push(ScriptedTurn::Response(Box::new(ChatResponse::new(message))))
    }

    /// Script a response with usage attached.
    #[must_use]
    pub fn then_text_with_usage(self, text: impl Into<String>, usage: Usage) -> Self {
        self.push(ScriptedTurn::Response(Box::new(
            ChatResponse::from_text(text).with_usage(usage),
        )))
    }

    /// Script a body-level provider error.
    #[must_use]
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.push(ScriptedTurn::Response(Box::new(
            ChatResponse::new(Message::assistant("")).with_error(message),
        )))
    }

    /// Script a streaming turn from raw wire chunks.
    #[must_use]
    pub fn then_chunks(self, chunks: Vec<ChatChunk>) -> Self {
        self.push(ScriptedTurn::Chunks(chunks))
    }

    /// Number of model calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of the recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_turn(&self, request: &ChatRequest) -> Result<ScriptedTurn> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.turns
            .lock()
            .ok()
            .and_then(|mut turns| turns.pop_front())
            .ok_or_else(|| Error::provider("mock provider script exhausted"))
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        match self.next_turn(request)? {
            ScriptedTurn::Response(response) => Ok(*response),
            ScriptedTurn::Chunks(chunks) => {
                let mut aggregator = ChunkAggregator::new();
                for chunk in &chunks {
                    aggregator.apply(chunk);
                }
                Ok(aggregator.into_response())
            }
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let chunks = match self.next_turn(request)? {
            ScriptedTurn::Chunks(chunks) => chunks,
            ScriptedTurn::Response(response) => synthesize_chunks(&response),
        };
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Break a scripted complete response into plausible wire chunks.
fn synthesize_chunks(response: &ChatResponse) -> Vec<ChatChunk> {
    let mut chunks = Vec::new();
    if !response.message.content.is_empty() {
        chunks.push(ChatChunk::text(response.message.content.clone()));
    }
    for (index, call) in response.tool_calls().iter().enumerate() {
        chunks.push(ChatChunk::tool_call_delta(
            index,
            Some(call.id.as_str()),
            Some(call.name()),
            Some(call.function.arguments.as_str()),
        ));
    }
    if let Some(usage) = response.usage {
        chunks.push(ChatChunk::with_usage(usage));
    }
    chunks
}
