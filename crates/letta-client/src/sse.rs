//! Server-Sent Events line framing.
//!
//! The agent's stream is consumed line by line: every `data: ` line is a
//! complete JSON frame, `data: [DONE]` ends the stream, and everything else
//! is framing noise.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// How a single line of the stream should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Whitespace only.
    Blank,
    /// Not a data line (comment, `event:`, `id:`, keep-alive).
    Ignored,
    /// The terminal sentinel.
    Done,
    /// Payload after the `data: ` prefix.
    Data(&'a str),
}

/// Classify one line with its terminator already removed.
pub fn classify_line(line: &str) -> SseLine<'_> {
    if line.trim().is_empty() {
        return SseLine::Blank;
    }
    if line == DONE_SENTINEL {
        return SseLine::Done;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => SseLine::Data(payload),
        None => SseLine::Ignored,
    }
}

/// Stream wrapper that splits a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte characters split
/// across network chunks decode intact. A trailing `\r` is stripped.
pub struct SseLines<S> {
    inner: S,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> SseLines<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                let raw = std::mem::take(&mut self.buf);
                self.pending.push_back(decode_line(&raw));
            } else {
                self.buf.push(b);
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl<S, E> Stream for SseLines<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.push_bytes(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    // Flush a final line that had no trailing newline.
                    this.finished = true;
                    if !this.buf.is_empty() {
                        let raw = std::mem::take(&mut this.buf);
                        this.pending.push_back(decode_line(&raw));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Create a line stream from a byte stream.
pub fn sse_lines<S, E>(stream: S) -> SseLines<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseLines::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn bytes_stream(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn collect_raw(chunks: Vec<Vec<u8>>) -> Vec<String> {
        sse_lines(bytes_stream(chunks))
            .map(|line| line.unwrap())
            .collect()
            .await
    }

    async fn collect_lines(chunks: Vec<&'static str>) -> Vec<String> {
        collect_raw(chunks.into_iter().map(|c| c.as_bytes().to_vec()).collect()).await
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify_line(""), SseLine::Blank);
        assert_eq!(classify_line("   "), SseLine::Blank);
        assert_eq!(classify_line(": keep-alive"), SseLine::Ignored);
        assert_eq!(classify_line("event: message"), SseLine::Ignored);
        assert_eq!(classify_line("data:{}"), SseLine::Ignored);
        assert_eq!(classify_line("data: [DONE]"), SseLine::Done);
        assert_eq!(classify_line("data: {\"a\":1}"), SseLine::Data("{\"a\":1}"));
    }

    #[test]
    fn sentinel_must_match_exactly() {
        assert_eq!(classify_line("data: [DONE] "), SseLine::Data("[DONE] "));
        assert_eq!(classify_line("data: [done]"), SseLine::Data("[done]"));
    }

    #[tokio::test]
    async fn split_simple_lines() {
        let lines = collect_lines(vec!["data: one\n\ndata: two\n"]).await;
        assert_eq!(lines, vec!["data: one", "", "data: two"]);
    }

    #[tokio::test]
    async fn split_chunked_data() {
        let lines = collect_lines(vec!["data: hel", "lo wor", "ld\n"]).await;
        assert_eq!(lines, vec!["data: hello world"]);
    }

    #[tokio::test]
    async fn strip_crlf() {
        let lines = collect_lines(vec!["data: hello\r\n\r\n"]).await;
        assert_eq!(lines, vec!["data: hello", ""]);
    }

    #[tokio::test]
    async fn multibyte_char_split_across_chunks() {
        // "é" is 0xC3 0xA9
        let lines = collect_raw(vec![b"data: caf\xC3".to_vec(), b"\xA9\n".to_vec()]).await;
        assert_eq!(lines, vec!["data: café"]);
    }

    #[tokio::test]
    async fn final_line_without_newline() {
        let lines = collect_lines(vec!["data: first\ndata: final"]).await;
        assert_eq!(lines, vec!["data: first", "data: final"]);
    }

    #[tokio::test]
    async fn empty_stream() {
        let lines = collect_lines(vec![]).await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn inner_error_is_forwarded() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: ok\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut lines = sse_lines(futures::stream::iter(chunks));

        assert_eq!(lines.next().await.unwrap().unwrap(), "data: ok");
        let err = lines.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }
}
