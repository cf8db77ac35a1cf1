//! WebSocket push channel against a local scripted server.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::SinkExt;
use prism_core::{ChannelError, RetryConfig};
use prism_dashboard::{ChannelStatus, PushChannel, WsPushChannel};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
    }
}

/// Accept one connection per script, send its frames, then close it.
/// The listener is dropped after the last script.
async fn scripted_server(scripts: Vec<Vec<Message>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(tokio::spawn(async move {
        for script in scripts {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            for msg in script {
                ws.send(msg).await.unwrap();
            }
            let _ = ws.close(None).await;
        }
    }));
    format!("ws://{addr}/ws")
}

fn envelope(event_type: &str) -> Message {
    Message::text(json!({"type": event_type, "timestamp": 1, "data": {}}).to_string())
}

#[tokio::test]
async fn decodes_frames_reconnects_and_gives_up() {
    let url = scripted_server(vec![
        vec![
            envelope("portfolio_update"),
            Message::binary(vec![1, 2, 3]),
            Message::text("{not json"),
        ],
        vec![envelope("news_update")],
    ])
    .await;

    let mut channel = WsPushChannel::new(url, fast_retry(3));
    let status = channel.status();

    let first = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_eq!(first.unwrap().unwrap().event_type, "portfolio_update");
    assert_eq!(*status.borrow(), ChannelStatus::Connected);

    // binary frame skipped, bad text surfaces as a decode error
    let second = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_matches!(second, Some(Err(ChannelError::Decode(_))));

    // server closed; the channel reconnects to the next script
    let third = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_eq!(third.unwrap().unwrap().event_type, "news_update");

    // listener gone: connect failures until the retry budget runs out
    let mut errors = Vec::new();
    loop {
        match timeout(TIMEOUT, channel.next_envelope()).await.unwrap() {
            Some(Err(err)) => errors.push(err),
            Some(Ok(env)) => panic!("unexpected envelope {env:?}"),
            None => break,
        }
    }
    assert_matches!(errors.last(), Some(ChannelError::RetriesExhausted { attempts: 3 }));
    assert!(
        errors[..errors.len() - 1]
            .iter()
            .all(|e| matches!(e, ChannelError::Connect { .. }))
    );
    assert_eq!(*status.borrow(), ChannelStatus::Disconnected);
    assert!(channel.next_envelope().await.is_none());
}

#[tokio::test]
async fn unreachable_endpoint_exhausts_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut channel = WsPushChannel::new(format!("ws://{addr}/ws"), fast_retry(2));
    let mut status = channel.status();

    let first = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_matches!(first, Some(Err(ChannelError::Connect { .. })));

    let second = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_matches!(second, Some(Err(ChannelError::Connect { .. })));
    assert!(status.has_changed().unwrap());
    assert_eq!(
        *status.borrow_and_update(),
        ChannelStatus::Reconnecting { attempt: 1 }
    );

    let third = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert_matches!(third, Some(Err(ChannelError::RetriesExhausted { attempts: 2 })));
    assert!(channel.next_envelope().await.is_none());
}

#[tokio::test]
async fn close_stops_delivery() {
    let url = scripted_server(vec![vec![envelope("ai_insight")]]).await;
    let mut channel = WsPushChannel::new(url, fast_retry(3));

    let first = timeout(TIMEOUT, channel.next_envelope()).await.unwrap();
    assert!(first.unwrap().is_ok());

    channel.close().await;
    assert!(channel.next_envelope().await.is_none());
    assert_eq!(*channel.status().borrow(), ChannelStatus::Disconnected);
}
