//! Minimal WebSocket client helpers for reading status and probing latency.

use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::types::{LatencyFrame, StatusMessage};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one ping/pong exchange.
#[derive(Debug, Clone, Copy)]
pub struct LatencySample {
    /// Latency computed by the agent (its receive time minus our send time).
    pub reported_ms: i64,
    /// Round trip observed locally.
    pub round_trip: Duration,
}

// Connect to the agent and return the WS stream
pub async fn connect(url: &str) -> anyhow::Result<WsStream> {
    let parsed = Url::parse(url).with_context(|| format!("invalid url {url:?}"))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        bail!("expected ws:// or wss:// url, got {url:?}");
    }
    let (ws, _) = connect_async(parsed.as_str())
        .await
        .with_context(|| format!("connect {url}"))?;
    Ok(ws)
}

async fn next_text(ws: &mut WsStream) -> Option<String> {
    loop {
        match timeout(READ_TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(text),
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) | Err(_) => return None,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

// Await the next status push, skipping any other frames
pub async fn next_status(ws: &mut WsStream) -> Option<StatusMessage> {
    loop {
        let text = next_text(ws).await?;
        if let Ok(status) = serde_json::from_str::<StatusMessage>(&text) {
            return Some(status);
        }
    }
}

// Send a ping stamped with the local wall clock and await its pong
pub async fn measure_latency(ws: &mut WsStream) -> Option<LatencySample> {
    let ping = LatencyFrame::Ping {
        timestamp: chrono::Utc::now().timestamp_millis(),
    };
    let frame = serde_json::to_string(&ping).ok()?;
    let started = Instant::now();
    ws.send(Message::Text(frame)).await.ok()?;
    loop {
        let text = next_text(ws).await?;
        if let Ok(LatencyFrame::Pong { latency }) = serde_json::from_str(&text) {
            return Some(LatencySample {
                reported_ms: latency,
                round_trip: started.elapsed(),
            });
        }
    }
}
