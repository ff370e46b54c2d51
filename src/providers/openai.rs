//! OpenAI Chat Completions provider.
//!
//! Implements [`ModelProvider`] over `reqwest`, including SSE parsing of the
//! streaming response into wire-format [`ChatChunk`]s. HTTP-level failures
//! surface as [`Error::Provider`] with the status class; an error object in
//! an otherwise successful body is surfaced through
//! [`ChatResponse::error`] so the turn executor can terminate the turn.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::chat::{ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelProvider};
use crate::error::{Error, Result};
use crate::message::{Message, Role, ToolCall};
use crate::usage::Usage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat Completions client for the OpenAI API (and compatible endpoints).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a provider with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the variable is unset.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::configuration("OPENAI_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }

    /// Point the client at a compatible endpoint (e.g., a local proxy).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
                .unwrap_or(text);
            return Err(Error::Provider {
                message,
                status: Some(status.as_u16()),
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = serde_json::to_value(request)?;
        debug!(model = request.model, messages = request.messages.len(), "chat completion request");

        let payload: Value = self.post(&body).await?.json().await?;
        let wire: WireResponse = serde_json::from_value(payload)?;

        if let Some(error) = wire.error {
            return Ok(ChatResponse::new(Message::assistant("")).with_error(error.message));
        }

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider("response contained no choices"))?;

        let mut response = ChatResponse::new(choice.message.into_message());
        response.usage = wire.usage;
        response.model = wire.model;
        response.id = wire.id;
        Ok(response)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let mut body = serde_json::to_value(request)?;
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });

        let response = self.post(&body).await?;
        let bytes = Box::pin(response.bytes_stream().map(|item| item.map_err(Error::from)));
        Ok(Box::pin(SseChunkStream::new(bytes)))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Wire response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl WireMessage {
    fn into_message(self) -> Message {
        Message {
            role: Role::Assistant,
            content: self.content.unwrap_or_default(),
            tool_calls: self.tool_calls.filter(|calls| !calls.is_empty()),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

// ---------------------------------------------------------------------------
// SSE chunk stream
// ---------------------------------------------------------------------------

/// Parses an SSE byte stream into wire-format chunks.
///
/// Buffers partial lines across network reads; `data: [DONE]` ends the
/// payload stream.
struct SseChunkStream<S> {
    inner: S,
    buffer: String,
    done: bool,
}

impl<S> SseChunkStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    const fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: String::new(),
            done: false,
        }
    }

    fn parse_line(line: &str) -> Option<SseLine> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return None;
        }
        let data = trimmed.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            return Some(SseLine::Done);
        }
        Some(match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => SseLine::Chunk(chunk),
            Err(e) => SseLine::Malformed(format!("malformed stream chunk: {e}")),
        })
    }
}

enum SseLine {
    Chunk(ChatChunk),
    Malformed(String),
    Done,
}

impl<S> Stream for SseChunkStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<ChatChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            if let Some(newline) = self.buffer.find('\n') {
                let line: String = self.buffer.drain(..=newline).collect();
                match Self::parse_line(&line) {
                    Some(SseLine::Chunk(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                    Some(SseLine::Malformed(message)) => {
                        return Poll::Ready(Some(Err(Error::provider(message))));
                    }
                    Some(SseLine::Done) => {
                        self.done = true;
                        return Poll::Ready(None);
                    }
                    None => continue,
                }
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    // Flush any trailing line without a newline terminator.
                    if self.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let rest = std::mem::take(&mut self.buffer);
                    self.done = true;
                    for line in rest.lines() {
                        match Self::parse_line(line) {
                            Some(SseLine::Chunk(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                            Some(SseLine::Malformed(message)) => {
                                return Poll::Ready(Some(Err(Error::provider(message))));
                            }
                            _ => {}
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(parts: Vec<&str>) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn parses_sse_lines_into_chunks() {
        let sse = byte_stream(vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n",
        ]);
        let chunks: Vec<_> = SseChunkStream::new(sse).collect().await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().expect("chunk parses");
        assert_eq!(first.delta().and_then(|d| d.content.as_deref()), Some("Hel"));
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_reads() {
        let sse = byte_stream(vec![
            "data: {\"choices\":[{\"index\":0,\"del",
            "ta\":{\"content\":\"x\"}}]}\ndata: [DONE]\n",
        ]);
        let chunks: Vec<_> = SseChunkStream::new(sse).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_ok());
    }

    #[tokio::test]
    async fn malformed_chunk_surfaces_as_provider_error() {
        let sse = byte_stream(vec!["data: {not json}\n", "data: [DONE]\n"]);
        let chunks: Vec<_> = SseChunkStream::new(sse).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(Error::Provider { .. })));
    }

    #[tokio::test]
    async fn comments_and_blank_lines_are_skipped() {
        let sse = byte_stream(vec![
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"y\"}}]}\n",
            "data: [DONE]\n",
        ]);
        let chunks: Vec<_> = SseChunkStream::new(sse).collect().await;
        assert_eq!(chunks.len(), 1);
    }
}
