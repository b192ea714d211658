use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use gateway_core::{new_id, now_ms};
use gateway_price::ClientSink;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::heartbeat::PongTracker;
use crate::hub::WsHub;

/// Bridges a [`ClientSink`] call to the per-connection outbound channel.
/// Exactly one task ever reads from that channel and writes to the socket
/// (spec §5 "WebSocket write side: exactly one writer at a time per
/// socket").
struct ChannelSink {
    tx: mpsc::Sender<WsMessage>,
}

#[async_trait]
impl ClientSink for ChannelSink {
    /// Best-effort: a connection whose outbound queue is full gets this
    /// frame dropped rather than stalling the caller (spec §4.H
    /// price-update delivery is "best-effort"; applied here uniformly so
    /// one slow reader cannot block the conversation or price hubs).
    async fn send_json(&self, value: Value) {
        if self.tx.try_send(WsMessage::Text(value.to_string())).is_err() {
            tracing::debug!("dropping outbound frame: connection queue full or closed");
        }
    }
}

/// Axum handler: upgrade and hand off to [`run_connection`].
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<WsHub>>) -> Response {
    ws.on_upgrade(move |socket| run_connection(hub, socket))
}

async fn run_connection(hub: Arc<WsHub>, socket: WebSocket) {
    let session_id = new_id();
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(hub.config().message_queue_size);
    let sink: Arc<dyn ClientSink> = Arc::new(ChannelSink { tx: tx.clone() });

    if !hub.accept(&session_id, sink.clone()).await {
        let _ = ws_sink.close().await;
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let config = hub.config();
    let ping_interval = Duration::from_millis(config.ping_interval_ms.max(0) as u64);
    let mut ticker = tokio::time::interval(ping_interval);
    let mut tracker = PongTracker::new(now_ms());

    loop {
        tokio::select! {
            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => hub.handle_inbound(&session_id, sink.as_ref(), &text).await,
                    Some(Ok(WsMessage::Pong(_))) => tracker.record_pong(now_ms()),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = ticker.tick() => {
                if tracker.is_expired(now_ms(), config.ping_interval_ms, config.missed_pong_limit) {
                    tracing::debug!(session_id, "connection missed too many pongs, terminating");
                    break;
                }
                if tx.try_send(WsMessage::Ping(Vec::new())).is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(&session_id).await;
    drop(tx);
    let _ = writer.await;
}
