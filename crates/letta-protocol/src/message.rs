//! Stream chunk and snapshot types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary usage statistics object, as sent by the agent.
pub type UsageStats = Map<String, Value>;

/// One decoded frame of the agent's event stream, tagged by `message_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// A step of assistant output (`assistant_message`).
    AssistantMessage { content: String },

    /// Token usage statistics (`usage_statistics`). Holds the whole frame.
    UsageStatistics(UsageStats),

    /// The agent's reasoning trace (`reasoning_message`).
    ReasoningMessage { message: String },

    /// Any other `message_type`, or none at all.
    Unknown { message_type: Option<String> },
}

impl Chunk {
    /// Classify a decoded JSON object by its `message_type` field.
    pub fn from_object(object: Map<String, Value>) -> Self {
        let message_type = object
            .get("message_type")
            .and_then(Value::as_str)
            .map(str::to_owned);

        match message_type.as_deref() {
            Some("assistant_message") => Chunk::AssistantMessage {
                content: string_field(&object, "content"),
            },
            Some("usage_statistics") => Chunk::UsageStatistics(object),
            Some("reasoning_message") => Chunk::ReasoningMessage {
                message: string_field(&object, "message"),
            },
            _ => Chunk::Unknown { message_type },
        }
    }

    /// The wire tag of this chunk, `"unknown"` when absent.
    pub fn message_type(&self) -> &str {
        match self {
            Chunk::AssistantMessage { .. } => "assistant_message",
            Chunk::UsageStatistics(_) => "usage_statistics",
            Chunk::ReasoningMessage { .. } => "reasoning_message",
            Chunk::Unknown { message_type } => message_type.as_deref().unwrap_or("unknown"),
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Best-known state of a response while it is being streamed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingResponse {
    /// Assistant fragments so far, newline-joined. Only ever grows.
    pub content: String,
    /// Latest usage statistics frame, if enabled and seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_stats: Option<UsageStats>,
    /// Latest reasoning trace, if enabled and seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl StreamingResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Events emitted while a response streams.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// The snapshot changed.
    Update(StreamingResponse),

    /// The stream ended normally; carries the final content.
    Completed(String),
}
