//! Progress observers notified as a response streams in.
//!
//! An observer is awaited before the next chunk is decoded, so a slow
//! observer slows the stream down rather than letting updates pile up.

use async_trait::async_trait;
use letta_protocol::StreamingResponse;
use tokio::sync::mpsc;

/// Receives every snapshot change, in arrival order.
#[async_trait]
pub trait ResponseObserver: Send {
    async fn on_update(&mut self, snapshot: &StreamingResponse);
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl ResponseObserver for NoopObserver {
    async fn on_update(&mut self, _snapshot: &StreamingResponse) {}
}

/// Adapts a synchronous callback.
pub struct FnObserver<F>(pub F);

#[async_trait]
impl<F> ResponseObserver for FnObserver<F>
where
    F: FnMut(&StreamingResponse) + Send,
{
    async fn on_update(&mut self, snapshot: &StreamingResponse) {
        (self.0)(snapshot)
    }
}

/// Forwards snapshot clones into a channel.
///
/// Waits for channel capacity. Once the receiver is dropped, further
/// updates are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<StreamingResponse>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<StreamingResponse>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of a channel of `capacity` slots.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamingResponse>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ResponseObserver for ChannelObserver {
    async fn on_update(&mut self, snapshot: &StreamingResponse) {
        // Closed receiver: the caller stopped listening.
        let _ = self.tx.send(snapshot.clone()).await;
    }
}
