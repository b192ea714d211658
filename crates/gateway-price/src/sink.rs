use async_trait::async_trait;
use serde_json::Value;

/// The hub's view of a connected client: just "can I hand it a JSON frame".
/// The WebSocket hub crate implements this over its socket writer.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send_json(&self, value: Value);
}
