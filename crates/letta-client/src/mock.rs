//! Scripted agent streams for testing.
//!
//! Renders frames in the same SSE framing the agent uses, so tests can
//! exercise decoding and accumulation either directly on a byte stream or
//! through an HTTP mock server serving [`MockConfig::body`].

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::json;
use tokio::time::sleep;

/// One scripted stream element.
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// `assistant_message` with `content`.
    Assistant { content: String },
    /// `reasoning_message` with `message`.
    Reasoning { message: String },
    /// `usage_statistics` frame.
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// Any other `message_type`.
    Other { message_type: String },
    /// A line emitted verbatim (comments, malformed data).
    Raw { line: String },
    /// The `data: [DONE]` sentinel.
    Done,
    /// Delay before the next frame (for timing tests). Renders nothing.
    Delay { ms: u64 },
}

impl MockFrame {
    pub fn assistant(content: &str) -> Self {
        MockFrame::Assistant {
            content: content.to_string(),
        }
    }

    pub fn reasoning(message: &str) -> Self {
        MockFrame::Reasoning {
            message: message.to_string(),
        }
    }

    pub fn other(message_type: &str) -> Self {
        MockFrame::Other {
            message_type: message_type.to_string(),
        }
    }

    pub fn raw(line: &str) -> Self {
        MockFrame::Raw {
            line: line.to_string(),
        }
    }

    /// SSE text for this frame, `None` for delays.
    pub fn render(&self) -> Option<String> {
        let data = match self {
            MockFrame::Assistant { content } => json!({
                "message_type": "assistant_message",
                "content": content,
            }),
            MockFrame::Reasoning { message } => json!({
                "message_type": "reasoning_message",
                "message": message,
            }),
            MockFrame::Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            } => json!({
                "message_type": "usage_statistics",
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": total_tokens,
            }),
            MockFrame::Other { message_type } => json!({ "message_type": message_type }),
            MockFrame::Raw { line } => return Some(format!("{line}\n")),
            MockFrame::Done => return Some("data: [DONE]\n\n".to_string()),
            MockFrame::Delay { .. } => return None,
        };
        Some(format!("data: {data}\n\n"))
    }
}

/// Configuration for a mock stream.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Sequence of frames to emit.
    pub frames: Vec<MockFrame>,
    /// Optional delay between each frame (ms).
    pub chunk_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames(mut self, frames: Vec<MockFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }

    /// The whole stream as one response body. Delays are ignored.
    pub fn body(&self) -> String {
        self.frames.iter().filter_map(MockFrame::render).collect()
    }
}

/// Emit the frames as a byte stream, one network chunk per frame.
pub fn mock_byte_stream(config: MockConfig) -> BoxStream<'static, Result<Bytes, Infallible>> {
    Box::pin(stream! {
        for frame in config.frames {
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match frame {
                MockFrame::Delay { ms } => sleep(Duration::from_millis(ms)).await,
                other => {
                    if let Some(text) = other.render() {
                        yield Ok(Bytes::from(text));
                    }
                }
            }
        }
    })
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// Assistant steps followed by the sentinel.
    pub fn steps(contents: &[&str]) -> MockConfig {
        let mut frames: Vec<MockFrame> = contents.iter().map(|c| MockFrame::assistant(c)).collect();
        frames.push(MockFrame::Done);
        MockConfig::new().with_frames(frames)
    }

    /// Reasoning, assistant steps, a usage frame, then the sentinel.
    pub fn reasoning_then_steps(reasoning: &str, contents: &[&str], total_tokens: u64) -> MockConfig {
        let mut frames = vec![MockFrame::reasoning(reasoning)];
        frames.extend(contents.iter().map(|c| MockFrame::assistant(c)));
        frames.push(MockFrame::Usage {
            prompt_tokens: total_tokens / 2,
            completion_tokens: total_tokens - total_tokens / 2,
            total_tokens,
        });
        frames.push(MockFrame::Done);
        MockConfig::new().with_frames(frames)
    }

    /// Two assistant steps with a truncated JSON frame and framing noise
    /// between them.
    pub fn malformed_between(first: &str, second: &str) -> MockConfig {
        MockConfig::new().with_frames(vec![
            MockFrame::assistant(first),
            MockFrame::raw(": keep-alive"),
            MockFrame::raw(r#"data: {"message_type":"assistant_message","content":"#),
            MockFrame::raw("event: message"),
            MockFrame::assistant(second),
            MockFrame::Done,
        ])
    }

    /// A step, the sentinel, then a step that must never be decoded.
    pub fn trailing_after_done(kept: &str, dropped: &str) -> MockConfig {
        MockConfig::new().with_frames(vec![
            MockFrame::assistant(kept),
            MockFrame::Done,
            MockFrame::assistant(dropped),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn render_frames() {
        assert_eq!(
            MockFrame::assistant("Hi").render().unwrap(),
            "data: {\"content\":\"Hi\",\"message_type\":\"assistant_message\"}\n\n"
        );
        assert_eq!(MockFrame::Done.render().unwrap(), "data: [DONE]\n\n");
        assert_eq!(MockFrame::raw(": ping").render().unwrap(), ": ping\n");
        assert!(MockFrame::Delay { ms: 5 }.render().is_none());
    }

    #[test]
    fn body_concatenates_frames() {
        let body = fixtures::steps(&["a"]).body();
        assert!(body.starts_with("data: {"));
        assert!(body.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn chunk_delay_paces_every_frame() {
        let config = fixtures::steps(&["a", "b"]).with_chunk_delay(30);
        let started = std::time::Instant::now();
        let chunks: Vec<_> = mock_byte_stream(config).collect().await;

        assert_eq!(chunks.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn byte_stream_skips_delays() {
        let config = MockConfig::new().with_frames(vec![
            MockFrame::assistant("a"),
            MockFrame::Delay { ms: 1 },
            MockFrame::Done,
        ]);
        let chunks: Vec<_> = mock_byte_stream(config).collect().await;
        assert_eq!(chunks.len(), 2);
    }
}
