//! The streaming event bridge.
//!
//! Translates wire-format chat-completion deltas ([`ChatChunk`]) into a
//! higher-level event stream ([`StreamEvent`]) with strictly increasing
//! sequence numbers, and accumulates the same chunks into a complete
//! [`ChatResponse`] for the turn loop.
//!
//! # Canonical event order
//!
//! 1. `response.created` — first chunk seen
//! 2. `response.output_item.added` — first text/refusal/tool-call appearance
//! 3. `response.content_part.added` — before the first text/refusal delta
//! 4. `response.output_text.delta` / `response.refusal.delta` — per fragment
//! 5. `response.content_part.done` — after the part's last fragment
//! 6. `response.function_call_arguments.delta` — per tool-call fragment
//! 7. `response.output_item.done` — per completed item
//! 8. `response.completed` — final synthesized response with normalized usage
//!
//! Text and refusal fragments accumulate in order. Tool calls are keyed by
//! `index`; their `id`, `name`, and `arguments` fields concatenate across
//! chunks. Content parts of the assistant message share the fixed item id
//! [`MESSAGE_ITEM_ID`], stable for the whole stream.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::chat::{ChatChunk, ChatResponse};
use crate::message::{Message, ToolCall};
use crate::usage::Usage;

/// Sentinel item id grouping the content parts of the assistant message.
pub const MESSAGE_ITEM_ID: &str = "msg_0";

/// An output item announced by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// The assistant message item.
    Message {
        /// Item id (the [`MESSAGE_ITEM_ID`] sentinel).
        id: String,
    },
    /// A function/tool call item.
    FunctionCall {
        /// Item id (`fc_<index>`).
        id: String,
        /// The provider-assigned tool call id.
        call_id: String,
        /// Function name.
        name: String,
        /// Accumulated arguments JSON text.
        arguments: String,
    },
}

impl OutputItem {
    /// The item's id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Message { id } | Self::FunctionCall { id, .. } => id,
        }
    }
}

/// The final synthesized response carried by `response.completed`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedResponse {
    /// Completion id reported by the provider, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Accumulated assistant text.
    pub output_text: String,
    /// Accumulated refusal text, empty when none.
    pub refusal: String,
    /// Completed tool calls in index order.
    pub tool_calls: Vec<ToolCall>,
    /// Normalized usage (`input_tokens` / `output_tokens` / `total_tokens`,
    /// plus cached and reasoning details when reported).
    pub usage: Usage,
}

/// A bridge event with its stream-unique sequence number.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    /// Strictly increasing, gapless, starting at zero.
    pub sequence_number: u64,
    /// The event payload.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StreamEvent {
    /// The event's kind string (e.g., `"response.output_text.delta"`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Payload of a bridge event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// First chunk seen.
    #[serde(rename = "response.created")]
    Created,
    /// A new output item appeared.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// The announced item.
        item: OutputItem,
    },
    /// A content part opened on the message item.
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        /// Owning item id.
        item_id: String,
    },
    /// A text fragment.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Owning item id.
        item_id: String,
        /// The fragment.
        delta: String,
    },
    /// A refusal fragment.
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta {
        /// Owning item id.
        item_id: String,
        /// The fragment.
        delta: String,
    },
    /// The open content part closed.
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        /// Owning item id.
        item_id: String,
        /// Full accumulated part text.
        text: String,
    },
    /// A tool-call arguments fragment.
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Owning item id (`fc_<index>`).
        item_id: String,
        /// The fragment.
        delta: String,
    },
    /// An output item completed.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// The completed item.
        item: OutputItem,
    },
    /// The stream finished.
    #[serde(rename = "response.completed")]
    Completed {
        /// The synthesized response.
        response: CompletedResponse,
    },
}

impl EventPayload {
    /// The payload's kind string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created => "response.created",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::ContentPartAdded { .. } => "response.content_part.added",
            Self::OutputTextDelta { .. } => "response.output_text.delta",
            Self::RefusalDelta { .. } => "response.refusal.delta",
            Self::ContentPartDone { .. } => "response.content_part.done",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::OutputItemDone { .. } => "response.output_item.done",
            Self::Completed { .. } => "response.completed",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
    announced: bool,
}

impl ToolCallAccumulator {
    fn item_id(index: usize) -> String {
        format!("fc_{index}")
    }

    fn into_item(self, index: usize) -> OutputItem {
        OutputItem::FunctionCall {
            id: Self::item_id(index),
            call_id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }

    fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(self.id.clone(), self.name.clone(), self.arguments.clone())
    }
}

/// Translates wire chunks into the canonical event stream.
///
/// Feed every chunk through [`EventBridge::push`] in arrival order, then
/// call [`EventBridge::finish`] once. Each call returns the events produced
/// by that step; sequence numbers are gapless across the whole stream, with
/// exactly one `response.created` and one `response.completed`.
#[derive(Debug, Clone, Default)]
pub struct EventBridge {
    seq: u64,
    created: bool,
    response_id: Option<String>,
    message_added: bool,
    part_open: bool,
    part_text: String,
    text: String,
    refusal: String,
    tool_calls: BTreeMap<usize, ToolCallAccumulator>,
    usage: Option<Usage>,
}

impl EventBridge {
    /// Create a bridge for one stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn event(&mut self, payload: EventPayload) -> StreamEvent {
        let event = StreamEvent {
            sequence_number: self.seq,
            payload,
        };
        self.seq += 1;
        event
    }

    fn open_part(&mut self, out: &mut Vec<StreamEvent>) {
        if !self.message_added {
            self.message_added = true;
            let event = self.event(EventPayload::OutputItemAdded {
                item: OutputItem::Message {
                    id: MESSAGE_ITEM_ID.to_owned(),
                },
            });
            out.push(event);
        }
        if !self.part_open {
            self.part_open = true;
            let event = self.event(EventPayload::ContentPartAdded {
                item_id: MESSAGE_ITEM_ID.to_owned(),
            });
            out.push(event);
        }
    }

    fn close_part(&mut self, out: &mut Vec<StreamEvent>) {
        if self.part_open {
            self.part_open = false;
            let text = std::mem::take(&mut self.part_text);
            let event = self.event(EventPayload::ContentPartDone {
                item_id: MESSAGE_ITEM_ID.to_owned(),
                text,
            });
            out.push(event);
        }
    }

    /// Apply one chunk, returning the events it produced.
    pub fn push(&mut self, chunk: &ChatChunk) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if !self.created {
            self.created = true;
            let event = self.event(EventPayload::Created);
            out.push(event);
        }
        if self.response_id.is_none() {
            self.response_id.clone_from(&chunk.id);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let Some(delta) = chunk.delta().cloned() else {
            return out;
        };

        if let Some(content) = delta.content.as_deref().filter(|c| !c.is_empty()) {
            self.open_part(&mut out);
            self.text.push_str(content);
            self.part_text.push_str(content);
            let event = self.event(EventPayload::OutputTextDelta {
                item_id: MESSAGE_ITEM_ID.to_owned(),
                delta: content.to_owned(),
            });
            out.push(event);
        }

        if let Some(refusal) = delta.refusal.as_deref().filter(|r| !r.is_empty()) {
            self.open_part(&mut out);
            self.refusal.push_str(refusal);
            self.part_text.push_str(refusal);
            let event = self.event(EventPayload::RefusalDelta {
                item_id: MESSAGE_ITEM_ID.to_owned(),
                delta: refusal.to_owned(),
            });
            out.push(event);
        }

        for tc in delta.tool_calls.unwrap_or_default() {
            // A tool call interrupts the message's content part.
            self.close_part(&mut out);

            let (announce, call_id, name) = {
                let entry = self.tool_calls.entry(tc.index).or_default();
                if let Some(id) = &tc.id {
                    entry.id.push_str(id);
                }
                if let Some(function) = &tc.function {
                    if let Some(name) = &function.name {
                        entry.name.push_str(name);
                    }
                }
                let announce = !entry.announced;
                entry.announced = true;
                (announce, entry.id.clone(), entry.name.clone())
            };

            if announce {
                let item = OutputItem::FunctionCall {
                    id: ToolCallAccumulator::item_id(tc.index),
                    call_id,
                    name,
                    arguments: String::new(),
                };
                let event = self.event(EventPayload::OutputItemAdded { item });
                out.push(event);
            }

            let arguments_delta = tc
                .function
                .as_ref()
                .and_then(|f| f.arguments.clone())
                .filter(|a| !a.is_empty());
            if let Some(arguments) = arguments_delta {
                if let Some(entry) = self.tool_calls.get_mut(&tc.index) {
                    entry.arguments.push_str(&arguments);
                }
                let event = self.event(EventPayload::FunctionCallArgumentsDelta {
                    item_id: ToolCallAccumulator::item_id(tc.index),
                    delta: arguments,
                });
                out.push(event);
            }
        }

        out
    }

    /// Close the stream, returning the trailing events.
    ///
    /// Emits `content_part.done`/`output_item.done` for the message when the
    /// text part is still open (i.e., no tool call interrupted it), one
    /// `output_item.done` per tool call in index order, and the final
    /// `response.completed`.
    #[must_use]
    pub fn finish(mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if !self.created {
            self.created = true;
            let event = self.event(EventPayload::Created);
            out.push(event);
        }

        let message_still_open = self.part_open;
        self.close_part(&mut out);
        if message_still_open {
            let event = self.event(EventPayload::OutputItemDone {
                item: OutputItem::Message {
                    id: MESSAGE_ITEM_ID.to_owned(),
                },
            });
            out.push(event);
        }

        let tool_calls = std::mem::take(&mut self.tool_calls);
        let mut completed_calls = Vec::with_capacity(tool_calls.len());
        for (index, accumulator) in tool_calls {
            completed_calls.push(accumulator.to_tool_call());
            let event = self.event(EventPayload::OutputItemDone {
                item: accumulator.into_item(index),
            });
            out.push(event);
        }

        let response = CompletedResponse {
            id: self.response_id.take(),
            output_text: std::mem::take(&mut self.text),
            refusal: std::mem::take(&mut self.refusal),
            tool_calls: completed_calls,
            usage: self.usage.take().unwrap_or_default(),
        };
        let event = self.event(EventPayload::Completed { response });
        out.push(event);

        out
    }
}

/// Accumulates wire chunks into a complete [`ChatResponse`].
///
/// The turn loop aggregates in parallel with the [`EventBridge`] so the same
/// stream both feeds events to the caller and reconstructs the assistant
/// message for tool dispatch and handoff detection.
#[derive(Debug, Clone, Default)]
pub struct ChunkAggregator {
    id: Option<String>,
    text: String,
    tool_calls: BTreeMap<usize, ToolCallAccumulator>,
    usage: Option<Usage>,
}

impl ChunkAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk.
    pub fn apply(&mut self, chunk: &ChatChunk) {
        if self.id.is_none() {
            self.id.clone_from(&chunk.id);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        let Some(delta) = chunk.delta() else {
            return;
        };
        if let Some(content) = &delta.content {
            self.text.push_str(content);
        }
        for tc in delta.tool_calls.as_deref().unwrap_or_default() {
            let entry = self.tool_calls.entry(tc.index).or_default();
            if let Some(id) = &tc.id {
                entry.id.push_str(id);
            }
            if let Some(function) = &tc.function {
                if let Some(name) = &function.name {
                    entry.name.push_str(name);
                }
                if let Some(arguments) = &function.arguments {
                    entry.arguments.push_str(arguments);
                }
            }
        }
    }

    /// Build the complete response from the accumulated state.
    #[must_use]
    pub fn into_response(self) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|acc| acc.to_tool_call())
            .collect();

        let message = if tool_calls.is_empty() {
            Message::assistant(self.text)
        } else {
            Message::assistant_with_tool_calls(self.text, tool_calls)
        };

        let mut response = ChatResponse::new(message);
        response.usage = self.usage;
        response.id = self.id;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::kind).collect()
    }

    #[test]
    fn canonical_order_text_then_tool_call() {
        let mut bridge = EventBridge::new();
        let mut events = Vec::new();

        events.extend(bridge.push(&ChatChunk::text("Hel")));
        events.extend(bridge.push(&ChatChunk::text("lo")));
        events.extend(bridge.push(&ChatChunk::tool_call_delta(
            0,
            Some("call_1"),
            Some("weather"),
            Some(r#"{"city":"Paris"}"#),
        )));
        events.extend(bridge.finish());

        assert_eq!(
            kinds(&events),
            vec![
                "response.created",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
                "response.output_text.delta",
                "response.content_part.done",
                "response.output_item.added",
                "response.function_call_arguments.delta",
                "response.output_item.done",
                "response.completed",
            ]
        );

        // Sequence numbers are gapless from zero.
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.sequence_number, i as u64);
        }
    }

    #[test]
    fn text_only_stream_closes_message_item() {
        let mut bridge = EventBridge::new();
        let mut events = Vec::new();
        events.extend(bridge.push(&ChatChunk::text("pong")));
        events.extend(bridge.finish());

        assert_eq!(
            kinds(&events),
            vec![
                "response.created",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
                "response.content_part.done",
                "response.output_item.done",
                "response.completed",
            ]
        );

        let StreamEvent {
            payload: EventPayload::Completed { response },
            ..
        } = events.last().expect("completed event")
        else {
            panic!("last event must be response.completed");
        };
        assert_eq!(response.output_text, "pong");
    }

    #[test]
    fn tool_call_fields_concatenate_across_chunks() {
        let mut bridge = EventBridge::new();
        let _ = bridge.push(&ChatChunk::tool_call_delta(0, Some("call_"), Some("wea"), None));
        let _ = bridge.push(&ChatChunk::tool_call_delta(0, Some("1"), Some("ther"), Some("{\"ci")));
        let _ = bridge.push(&ChatChunk::tool_call_delta(0, None, None, Some("ty\":\"P\"}")));
        let events = bridge.finish();

        let done = events
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::OutputItemDone {
                    item: OutputItem::FunctionCall {
                        call_id,
                        name,
                        arguments,
                        ..
                    },
                } => Some((call_id.clone(), name.clone(), arguments.clone())),
                _ => None,
            })
            .expect("function call item done");
        assert_eq!(done, (
            "call_1".to_owned(),
            "weather".to_owned(),
            "{\"city\":\"P\"}".to_owned(),
        ));
    }

    #[test]
    fn empty_stream_still_creates_and_completes() {
        let bridge = EventBridge::new();
        let events = bridge.finish();
        assert_eq!(kinds(&events), vec!["response.created", "response.completed"]);
    }

    #[test]
    fn usage_normalizes_into_completed() {
        let mut bridge = EventBridge::new();
        let _ = bridge.push(&ChatChunk::text("ok"));
        let _ = bridge.push(&ChatChunk::with_usage(
            Usage::new(10, 4).with_cached(2).with_reasoning(1),
        ));
        let events = bridge.finish();

        let EventPayload::Completed { response } = &events.last().expect("events").payload else {
            panic!("last event must be response.completed");
        };
        assert_eq!(response.usage.input_tokens, 10);
        assert_eq!(response.usage.output_tokens, 4);
        assert_eq!(response.usage.total_tokens, 14);
        assert_eq!(response.usage.cached_tokens(), 2);
        assert_eq!(response.usage.reasoning_tokens(), 1);
    }

    #[test]
    fn aggregator_reconstructs_assistant_message() {
        let mut aggregator = ChunkAggregator::new();
        aggregator.apply(&ChatChunk::text("checking "));
        aggregator.apply(&ChatChunk::text("now"));
        aggregator.apply(&ChatChunk::tool_call_delta(
            0,
            Some("call_9"),
            Some("weather"),
            Some("{}"),
        ));
        aggregator.apply(&ChatChunk::with_usage(Usage::new(5, 3)));

        let response = aggregator.into_response();
        assert_eq!(response.text(), "checking now");
        assert_eq!(response.tool_calls().len(), 1);
        assert_eq!(response.tool_calls()[0].id, "call_9");
        assert_eq!(response.usage, Some(Usage::new(5, 3)));
    }
}
