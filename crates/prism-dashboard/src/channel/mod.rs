//! Push channel seam.
//!
//! A [`PushChannel`] yields decoded [`PushEnvelope`]s in delivery order and
//! publishes its connection status on a `watch` channel. The session owns
//! exactly one channel and drives it; nothing here is global.
//!
//! - [`WsPushChannel`]: WebSocket client with reconnect backoff
//! - [`MemoryChannel`]: in-process channel fed through a [`MemoryChannelHandle`]

mod memory;
mod ws;

pub use memory::{MemoryChannel, MemoryChannelHandle};
pub use ws::WsPushChannel;

use async_trait::async_trait;
use prism_core::ChannelError;
use tokio::sync::watch;

use crate::event::PushEnvelope;

/// Connection status, surfaced as the dashboard's offline indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Connected and receiving.
    Connected,
    /// Connection lost; waiting before reconnect attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Not connected and not trying (initial, closed, or gave up).
    #[default]
    Disconnected,
}

impl ChannelStatus {
    /// Whether events can currently arrive.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Source of push envelopes.
#[async_trait]
pub trait PushChannel: Send {
    /// Next envelope or channel error.
    ///
    /// Errors are informational: the caller keeps polling and the channel
    /// recovers on its own where it can. `None` means the channel is finished
    /// (closed locally, or it gave up) and will yield nothing more.
    ///
    /// Must be cancel-safe: dropping the future loses no envelope.
    async fn next_envelope(&mut self) -> Option<Result<PushEnvelope, ChannelError>>;

    /// Close the channel. Later calls to `next_envelope` return `None`.
    async fn close(&mut self);

    /// Subscribe to connection status changes.
    fn status(&self) -> watch::Receiver<ChannelStatus>;
}

/// Update a status sender, notifying only on change.
fn set_status(tx: &watch::Sender<ChannelStatus>, status: ChannelStatus) {
    let _ = tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}
