use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use prism_core::ChannelError;
use tokio::sync::{mpsc, watch};

use super::{ChannelStatus, PushChannel, set_status};
use crate::event::PushEnvelope;

type Item = Result<PushEnvelope, ChannelError>;

/// In-process push channel. Envelopes pushed through the paired
/// [`MemoryChannelHandle`] are delivered in order; dropping the handle ends
/// the stream.
pub struct MemoryChannel {
    rx: mpsc::UnboundedReceiver<Item>,
    status: Arc<watch::Sender<ChannelStatus>>,
    closed: Arc<AtomicBool>,
}

/// Producer side of a [`MemoryChannel`].
#[derive(Clone)]
pub struct MemoryChannelHandle {
    tx: mpsc::UnboundedSender<Item>,
    status: Arc<watch::Sender<ChannelStatus>>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Create a connected channel and its handle.
    pub fn pair() -> (Self, MemoryChannelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ChannelStatus::Connected);
        let status = Arc::new(status_tx);
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx,
                status: Arc::clone(&status),
                closed: Arc::clone(&closed),
            },
            MemoryChannelHandle { tx, status, closed },
        )
    }
}

#[async_trait]
impl PushChannel for MemoryChannel {
    async fn next_envelope(&mut self) -> Option<Item> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.rx.close();
        set_status(&self.status, ChannelStatus::Disconnected);
    }

    fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }
}

impl MemoryChannelHandle {
    /// Deliver an envelope. Returns `false` once the channel is closed.
    pub fn push(&self, envelope: PushEnvelope) -> bool {
        self.tx.send(Ok(envelope)).is_ok()
    }

    /// Deliver a channel error.
    pub fn push_error(&self, error: ChannelError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Publish a status change.
    pub fn set_status(&self, status: ChannelStatus) {
        set_status(&self.status, status);
    }

    /// Whether the consumer closed the channel.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_in_order_then_ends_when_handle_drops() {
        let (mut channel, handle) = MemoryChannel::pair();
        assert!(handle.push(PushEnvelope::new("news_update", json!([]))));
        assert!(handle.push_error(ChannelError::Decode("bad".into())));
        drop(handle);

        let first = channel.next_envelope().await.unwrap().unwrap();
        assert_eq!(first.event_type, "news_update");
        assert_eq!(
            channel.next_envelope().await.unwrap(),
            Err(ChannelError::Decode("bad".into()))
        );
        assert!(channel.next_envelope().await.is_none());
    }

    #[tokio::test]
    async fn close_is_visible_to_handle() {
        let (mut channel, handle) = MemoryChannel::pair();
        let status = channel.status();
        assert_eq!(*status.borrow(), ChannelStatus::Connected);

        channel.close().await;
        assert!(handle.is_closed());
        assert!(!handle.push(PushEnvelope::new("news_update", json!([]))));
        assert!(channel.next_envelope().await.is_none());
        assert_eq!(*status.borrow(), ChannelStatus::Disconnected);
    }
}
