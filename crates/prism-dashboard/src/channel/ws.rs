use async_trait::async_trait;
use futures::StreamExt;
use prism_core::{ChannelError, RetryConfig};
use prism_settings::ChannelSettings;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::{ChannelStatus, PushChannel, set_status};
use crate::event::PushEnvelope;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Open,
    GaveUp,
    Closed,
}

/// WebSocket push channel.
///
/// Connects lazily on the first [`next_envelope`](PushChannel::next_envelope)
/// call. A dropped or failed connection is retried with exponential backoff
/// and jitter; the failure counter resets whenever a frame arrives, so
/// `max_retries` bounds *consecutive* failures. Once exhausted the channel
/// yields [`ChannelError::RetriesExhausted`] once and then `None`.
///
/// Text frames are decoded as [`PushEnvelope`]s. Binary frames are ignored;
/// ping/pong is handled by tungstenite.
pub struct WsPushChannel {
    url: String,
    retry: RetryConfig,
    stream: Option<WsStream>,
    failures: u32,
    lifecycle: Lifecycle,
    status: watch::Sender<ChannelStatus>,
}

impl WsPushChannel {
    /// Create a channel for `url` with the given reconnect policy.
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            url: url.into(),
            retry,
            stream: None,
            failures: 0,
            lifecycle: Lifecycle::Open,
            status,
        }
    }

    /// Create a channel from settings.
    pub fn from_settings(settings: &ChannelSettings) -> Self {
        Self::new(settings.url.clone(), settings.reconnect.clone())
    }

    /// The endpoint this channel dials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Consecutive failures since the last received frame.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.failures > 0 {
            if !self.retry.allows(self.failures) {
                self.lifecycle = Lifecycle::GaveUp;
                set_status(&self.status, ChannelStatus::Disconnected);
                warn!(url = %self.url, attempts = self.failures, "push channel giving up");
                return Err(ChannelError::RetriesExhausted {
                    attempts: self.failures,
                });
            }
            let delay = self.retry.delay_for(self.failures - 1);
            set_status(
                &self.status,
                ChannelStatus::Reconnecting {
                    attempt: self.failures,
                },
            );
            debug!(
                url = %self.url,
                attempt = self.failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting push channel"
            );
            tokio::time::sleep(delay).await;
        }

        match connect_async(self.url.as_str()).await {
            Ok((ws, _)) => {
                self.stream = Some(ws);
                set_status(&self.status, ChannelStatus::Connected);
                info!(url = %self.url, "push channel connected");
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                warn!(url = %self.url, failures = self.failures, error = %e, "push channel connect failed");
                Err(ChannelError::Connect {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn connection_lost(&mut self) {
        self.stream = None;
        self.failures += 1;
        if self.lifecycle == Lifecycle::Open {
            set_status(
                &self.status,
                ChannelStatus::Reconnecting {
                    attempt: self.failures,
                },
            );
        }
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn next_envelope(&mut self) -> Option<Result<PushEnvelope, ChannelError>> {
        loop {
            if self.lifecycle != Lifecycle::Open {
                return None;
            }
            if self.stream.is_none() {
                if let Err(err) = self.connect().await {
                    return Some(Err(err));
                }
            }
            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.failures = 0;
                    return Some(
                        serde_json::from_str::<PushEnvelope>(text.as_str())
                            .map_err(|e| ChannelError::Decode(e.to_string())),
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(url = %self.url, ?frame, "push channel closed by server");
                    self.connection_lost();
                }
                Some(Ok(_)) => {
                    self.failures = 0;
                }
                Some(Err(e)) => {
                    warn!(url = %self.url, error = %e, "push channel transport error");
                    self.connection_lost();
                    return Some(Err(ChannelError::Protocol(e.to_string())));
                }
                None => {
                    info!(url = %self.url, "push channel stream ended");
                    self.connection_lost();
                }
            }
        }
    }

    async fn close(&mut self) {
        self.lifecycle = Lifecycle::Closed;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "push channel close handshake failed");
            }
        }
        set_status(&self.status, ChannelStatus::Disconnected);
        info!(url = %self.url, "push channel closed");
    }

    fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }
}

impl std::fmt::Debug for WsPushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsPushChannel")
            .field("url", &self.url)
            .field("failures", &self.failures)
            .field("lifecycle", &self.lifecycle)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_settings_uses_url_and_policy() {
        let settings = ChannelSettings {
            url: "ws://127.0.0.1:9/ws".into(),
            ..ChannelSettings::default()
        };
        let channel = WsPushChannel::from_settings(&settings);
        assert_eq!(channel.url(), "ws://127.0.0.1:9/ws");
        assert_eq!(channel.consecutive_failures(), 0);
        assert_eq!(*channel.status().borrow(), ChannelStatus::Disconnected);
    }

    #[tokio::test]
    async fn closed_channel_yields_nothing() {
        let mut channel = WsPushChannel::new("ws://127.0.0.1:1/ws", RetryConfig::default());
        channel.close().await;
        assert!(channel.next_envelope().await.is_none());
    }
}
