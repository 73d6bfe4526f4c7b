//! Streaming event types and utilities
//!
//! This module provides the typed events delivered incrementally to chat
//! clients, plus the trace buffer used to detect structural delimiters in
//! the agent's token stream.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Category of a stream event, serialized as the `type` field on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    System,
    Analysis,
    AgentThought,
    AgentAction,
    AgentObservation,
    AgentFinal,
    Assistant,
    Calculation,
    Error,
}

impl StreamEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventKind::System => "system",
            StreamEventKind::Analysis => "analysis",
            StreamEventKind::AgentThought => "agent_thought",
            StreamEventKind::AgentAction => "agent_action",
            StreamEventKind::AgentObservation => "agent_observation",
            StreamEventKind::AgentFinal => "agent_final",
            StreamEventKind::Assistant => "assistant",
            StreamEventKind::Calculation => "calculation",
            StreamEventKind::Error => "error",
        }
    }
}

/// One incremental unit of output delivered to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::System, text)
    }

    pub fn analysis(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::Analysis, text)
    }

    pub fn agent_thought(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::AgentThought, text)
    }

    pub fn agent_action(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::AgentAction, text)
    }

    pub fn agent_observation(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::AgentObservation, text)
    }

    pub fn agent_final(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::AgentFinal, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::Assistant, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(StreamEventKind::Error, text)
    }

    /// Render the event as a server-sent-event frame (`data: {json}\n\n`)
    pub fn to_sse_frame(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(e) => {
                // StreamEvent has no non-serializable fields, so this is unreachable
                // in practice, but a broken frame must not take down the stream.
                log::error!("[STREAM] Failed to serialize event: {}", e);
                String::new()
            }
        }
    }
}

/// Sender for stream events
pub type StreamSender = mpsc::Sender<StreamEvent>;

/// Receiver for stream events
pub type StreamReceiver = mpsc::Receiver<StreamEvent>;

/// Create a new event channel with the specified buffer size
pub fn create_stream_channel(buffer_size: usize) -> (StreamSender, StreamReceiver) {
    mpsc::channel(buffer_size)
}

/// Delimiter flushing the buffer as an `agent_action` event
const ACTION_DELIMITER: &str = "Action:";
/// Delimiter flushing the buffer as an `agent_observation` event
const OBSERVATION_DELIMITER: &str = "Observation:";

/// Request-scoped buffer accumulating agent tokens until a structural
/// delimiter is recognized.
///
/// Tokens are appended as they arrive. Once the accumulated text contains
/// `Action:` or `Observation:` the whole buffer is flushed as a single typed
/// event and the buffer resets. Tokens that don't complete a delimiter are
/// surfaced immediately as `agent_thought` events so the client gets
/// low-latency "thinking" feedback; the buffer keeps accumulating regardless.
#[derive(Debug, Default)]
pub struct ToolTrace {
    buffer: String,
}

impl ToolTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one token and return the event it triggers, if any.
    pub fn push(&mut self, token: &str) -> Option<StreamEvent> {
        self.buffer.push_str(token);

        if self.buffer.contains(ACTION_DELIMITER) {
            let message = std::mem::take(&mut self.buffer);
            return Some(StreamEvent::agent_action(format!("\n{}", message)));
        }
        if self.buffer.contains(OBSERVATION_DELIMITER) {
            let message = std::mem::take(&mut self.buffer);
            return Some(StreamEvent::agent_observation(format!("\n{}", message)));
        }
        if !token.trim().is_empty() {
            return Some(StreamEvent::agent_thought(token));
        }
        None
    }

    /// Current buffered content (tokens since the last delimiter flush)
    #[cfg(test)]
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = StreamEvent::agent_final("done");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"text":"done","type":"agent_final"}"#);

        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, StreamEventKind::AgentFinal);
        assert_eq!(parsed.text, "done");
    }

    #[test]
    fn test_sse_frame() {
        let frame = StreamEvent::system("hello").to_sse_frame();
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));

        let payload = frame.trim_start_matches("data: ").trim_end();
        let parsed: StreamEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.kind, StreamEventKind::System);
    }

    #[test]
    fn test_trace_flushes_action_and_resets() {
        let mut trace = ToolTrace::new();

        let first = trace.push("I should search. ").unwrap();
        assert_eq!(first.kind, StreamEventKind::AgentThought);

        let event = trace.push("Action: search_docs").unwrap();
        assert_eq!(event.kind, StreamEventKind::AgentAction);
        assert!(event.text.contains("Action: search_docs"));
        assert!(trace.buffered().is_empty());

        // Tokens after a flush start a fresh buffer
        let next = trace.push("then").unwrap();
        assert_eq!(next.kind, StreamEventKind::AgentThought);
        assert_eq!(trace.buffered(), "then");
    }

    #[test]
    fn test_trace_flushes_observation() {
        let mut trace = ToolTrace::new();
        trace.push("Observ");
        let event = trace.push("ation: 42 results").unwrap();
        assert_eq!(event.kind, StreamEventKind::AgentObservation);
        assert!(event.text.contains("Observation: 42 results"));
        assert!(trace.buffered().is_empty());
    }

    #[test]
    fn test_trace_swallows_whitespace_tokens() {
        let mut trace = ToolTrace::new();
        assert!(trace.push("  ").is_none());
        assert!(trace.push("\n").is_none());
        // Whitespace still accumulates toward a delimiter match
        assert_eq!(trace.buffered(), "  \n");
    }

    #[test]
    fn test_delimiter_split_across_tokens() {
        let mut trace = ToolTrace::new();
        trace.push("Act");
        let event = trace.push("ion: get_time").unwrap();
        assert_eq!(event.kind, StreamEventKind::AgentAction);
    }
}
