//! Folds chunks into a [`StreamingResponse`] snapshot.

use letta_protocol::{Chunk, StreamingResponse};
use tracing::debug;

use crate::config::LettaConfig;

/// Per-call response state.
///
/// Assistant fragments are kept in arrival order and rendered newline-joined;
/// usage statistics and reasoning hold only the most recent value.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    fragments: Vec<String>,
    snapshot: StreamingResponse,
    show_reasoning: bool,
    show_usage_stats: bool,
}

impl ResponseAccumulator {
    pub fn new(show_reasoning: bool, show_usage_stats: bool) -> Self {
        Self {
            show_reasoning,
            show_usage_stats,
            ..Self::default()
        }
    }

    pub fn from_config(config: &LettaConfig) -> Self {
        Self::new(config.show_reasoning, config.show_usage_stats)
    }

    /// Apply one chunk. Returns `true` when the snapshot changed and
    /// observers should be notified.
    pub fn apply(&mut self, chunk: Chunk) -> bool {
        match chunk {
            Chunk::AssistantMessage { content } => {
                if content.is_empty() {
                    return false;
                }
                debug!(content = %content, "assistant message");
                if !self.fragments.is_empty() {
                    self.snapshot.content.push('\n');
                }
                self.snapshot.content.push_str(&content);
                self.fragments.push(content);
                true
            }
            Chunk::UsageStatistics(stats) => {
                if !self.show_usage_stats {
                    return false;
                }
                debug!(?stats, "usage statistics");
                self.snapshot.usage_stats = Some(stats);
                true
            }
            Chunk::ReasoningMessage { message } => {
                if !self.show_reasoning || message.is_empty() {
                    return false;
                }
                debug!(message = %message, "reasoning message");
                self.snapshot.reasoning = Some(message);
                true
            }
            Chunk::Unknown { .. } => false,
        }
    }

    pub fn snapshot(&self) -> &StreamingResponse {
        &self.snapshot
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Final response text.
    pub fn into_content(self) -> String {
        self.snapshot.content
    }
}
