//! Turns stream lines into typed [`Chunk`]s.

use async_stream::stream;
use futures::{Stream, StreamExt};
use letta_protocol::Chunk;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DecodeWarning;
use crate::sse::{classify_line, SseLine};

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Blank or non-data line.
    Skip,
    /// Terminal sentinel; nothing after it is decoded.
    Done,
    Chunk(Chunk),
    /// Data line whose payload is not a JSON object.
    Malformed(DecodeWarning),
}

pub fn decode_line(line: &str) -> LineOutcome {
    let payload = match classify_line(line) {
        SseLine::Blank | SseLine::Ignored => return LineOutcome::Skip,
        SseLine::Done => return LineOutcome::Done,
        SseLine::Data(payload) => payload,
    };

    let malformed = |reason: String| {
        LineOutcome::Malformed(DecodeWarning {
            line: line.to_string(),
            reason,
        })
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(object)) => LineOutcome::Chunk(Chunk::from_object(object)),
        Ok(other) => malformed(format!("expected a JSON object, got {other}")),
        Err(e) => malformed(e.to_string()),
    }
}

/// Decode a line stream into chunks.
///
/// Stops at the `data: [DONE]` sentinel or at the end of input. Malformed
/// frames are logged and skipped. An error from `lines` is forwarded and
/// ends the sequence.
pub fn decode_chunks<S, E>(lines: S) -> impl Stream<Item = Result<Chunk, E>>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    stream! {
        let mut lines = lines;

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            match decode_line(&line) {
                LineOutcome::Skip => {}
                LineOutcome::Done => {
                    debug!("received DONE marker");
                    return;
                }
                LineOutcome::Malformed(warning) => {
                    warn!(line = %warning.line, reason = %warning.reason, "skipping malformed frame");
                }
                LineOutcome::Chunk(chunk) => {
                    debug!(message_type = chunk.message_type(), "decoded chunk");
                    yield Ok(chunk);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> impl Stream<Item = Result<String, std::io::Error>> + Unpin {
        let owned: Vec<Result<String, std::io::Error>> =
            raw.iter().map(|l| Ok(l.to_string())).collect();
        futures::stream::iter(owned)
    }

    async fn decode_all(raw: &[&str]) -> Vec<Chunk> {
        decode_chunks(lines(raw))
            .map(|chunk| chunk.unwrap())
            .collect()
            .await
    }

    fn assistant(content: &str) -> Chunk {
        Chunk::AssistantMessage {
            content: content.to_string(),
        }
    }

    #[test]
    fn decode_data_line() {
        assert_eq!(
            decode_line(r#"data: {"message_type":"assistant_message","content":"Hi"}"#),
            LineOutcome::Chunk(assistant("Hi"))
        );
    }

    #[test]
    fn decode_framing_lines() {
        assert_eq!(decode_line(""), LineOutcome::Skip);
        assert_eq!(decode_line(": ping"), LineOutcome::Skip);
        assert_eq!(decode_line("event: message"), LineOutcome::Skip);
        assert_eq!(decode_line("data: [DONE]"), LineOutcome::Done);
    }

    #[test]
    fn decode_malformed_json() {
        match decode_line("data: {not json") {
            LineOutcome::Malformed(warning) => {
                assert_eq!(warning.line, "data: {not json");
                assert!(!warning.reason.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn decode_non_object_json() {
        assert!(matches!(decode_line("data: 42"), LineOutcome::Malformed(_)));
        assert!(matches!(decode_line("data: [1,2]"), LineOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn stops_at_done() {
        let chunks = decode_all(&[
            r#"data: {"message_type":"assistant_message","content":"before"}"#,
            "data: [DONE]",
            r#"data: {"message_type":"assistant_message","content":"after"}"#,
        ])
        .await;
        assert_eq!(chunks, vec![assistant("before")]);
    }

    #[tokio::test]
    async fn skips_malformed_frames() {
        let chunks = decode_all(&[
            r#"data: {"message_type":"assistant_message","content":"one"}"#,
            r#"data: {"message_type":"assistant_mess"#,
            r#"data: {"message_type":"assistant_message","content":"two"}"#,
        ])
        .await;
        assert_eq!(chunks, vec![assistant("one"), assistant("two")]);
    }

    #[tokio::test]
    async fn keeps_unknown_types() {
        let chunks = decode_all(&[
            r#"data: {"message_type":"tool_call_message","tool_call":{}}"#,
            ": keep-alive",
            "",
            r#"data: {"message_type":"assistant_message","content":"done"}"#,
        ])
        .await;
        assert_eq!(
            chunks,
            vec![
                Chunk::Unknown {
                    message_type: Some("tool_call_message".to_string())
                },
                assistant("done"),
            ]
        );
    }

    #[tokio::test]
    async fn ends_without_sentinel() {
        let chunks =
            decode_all(&[r#"data: {"message_type":"assistant_message","content":"x"}"#]).await;
        assert_eq!(chunks, vec![assistant("x")]);
    }

    #[tokio::test]
    async fn forwards_line_errors() {
        let items: Vec<Result<String, std::io::Error>> = vec![
            Ok(r#"data: {"message_type":"assistant_message","content":"x"}"#.to_string()),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof")),
            Ok(r#"data: {"message_type":"assistant_message","content":"y"}"#.to_string()),
        ];
        let results: Vec<_> = decode_chunks(futures::stream::iter(items)).collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &assistant("x"));
        assert!(results[1].is_err());
    }
}
