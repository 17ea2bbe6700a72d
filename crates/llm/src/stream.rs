//! Streaming support: SSE line decoding and response accumulation.
//!
//! Network chunks do not respect line boundaries, so the decoder buffers raw
//! bytes and only yields complete `data:` payloads. The accumulator rebuilds a
//! full [`LlmResponse`] from the deltas, including tool calls whose JSON
//! arguments arrive in fragments.

use std::collections::BTreeMap;

use crate::client::{LlmResponse, TokenUsage, ToolCall};

/// Incremental output forwarded to the caller while a completion streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of answer text
    ContentDelta(String),
    /// The model started a tool call
    ToolCallStarted { index: usize, name: String },
}

/// Splits a byte stream into SSE `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns every complete payload it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = Self::payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        Self::payload(&line)
    }

    fn payload(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() {
            None
        } else {
            Some(data.to_string())
        }
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Rebuilds a complete response from streamed deltas.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    model: String,
    usage: Option<TokenUsage>,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    /// Merge a tool-call fragment. Returns a start event the first time a
    /// call at `index` gets its name.
    pub fn push_tool_fragment(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: &str,
    ) -> Option<StreamEvent> {
        let call = self.tool_calls.entry(index).or_default();
        if let Some(id) = id {
            call.id = id.to_string();
        }
        call.arguments.push_str(arguments);
        match name {
            Some(name) if call.name.is_empty() && !name.is_empty() => {
                call.name = name.to_string();
                Some(StreamEvent::ToolCallStarted {
                    index,
                    name: call.name.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn set_model(&mut self, model: &str) {
        if !model.is_empty() {
            self.model = model.to_string();
        }
    }

    pub fn set_usage(&mut self, usage: TokenUsage) {
        self.usage = Some(usage);
    }

    pub fn set_finish_reason(&mut self, reason: &str) {
        self.finish_reason = Some(reason.to_string());
    }

    pub fn into_response(self) -> LlmResponse {
        let tool_calls = self
            .tool_calls
            .into_values()
            .filter(|c| !c.name.is_empty())
            .map(|c| ToolCall {
                id: c.id,
                name: c.name,
                arguments: c.arguments,
            })
            .collect();

        LlmResponse {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            tool_calls,
            model: self.model,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}
