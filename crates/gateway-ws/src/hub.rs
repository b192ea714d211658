use std::sync::Arc;

use gateway_conversation::ConversationManager;
use gateway_core::{now_ms, ErrorCode};
use gateway_metrics::MetricsCollector;
use gateway_price::{ClientSink, PriceHub};
use serde_json::json;

use crate::connections::ConnectionRegistry;
use crate::frame::{assistant_message, connection_established, error_frame, parse_inbound, pong, FrameError, InboundFrame};

#[derive(Debug, Clone, Copy)]
pub struct WsHubConfig {
    pub max_connections: usize,
    pub ping_interval_ms: i64,
    pub missed_pong_limit: u32,
    /// Bound on the per-connection outbound queue (spec §6
    /// `WS_MESSAGE_QUEUE_SIZE`); a slow reader backs up here rather than
    /// unboundedly growing memory.
    pub message_queue_size: usize,
}

impl Default for WsHubConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            ping_interval_ms: 30_000,
            missed_pong_limit: 2,
            message_queue_size: 256,
        }
    }
}

/// Transport-agnostic core of the WebSocket hub (spec §4.G): accept
/// bookkeeping, frame routing, and disconnect cleanup. The axum-specific
/// socket read/write loop lives in `server.rs` and drives this through
/// [`ClientSink`] rather than owning any routing logic itself.
pub struct WsHub {
    connections: ConnectionRegistry,
    conversation: Arc<ConversationManager>,
    price: Arc<PriceHub>,
    config: WsHubConfig,
    metrics: Arc<MetricsCollector>,
}

impl WsHub {
    pub fn new(
        conversation: Arc<ConversationManager>,
        price: Arc<PriceHub>,
        config: WsHubConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            connections: ConnectionRegistry::new(config.max_connections),
            conversation,
            price,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> WsHubConfig {
        self.config
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registers a newly-accepted connection and sends
    /// `CONNECTION_ESTABLISHED` (spec §4.G). Returns `false` if
    /// `maxConnections` was already reached — the caller refuses the
    /// accept; existing connections are never affected (spec §8 boundary
    /// behavior).
    pub async fn accept(&self, session_id: &str, sink: Arc<dyn ClientSink>) -> bool {
        if self.connections.at_capacity() {
            tracing::warn!(session_id, "rejecting connection: maxConnections reached");
            return false;
        }
        self.connections.register(session_id.to_string(), sink.clone());
        self.price.register_client(session_id.to_string(), sink.clone()).await;
        sink.send_json(connection_established(session_id)).await;
        true
    }

    /// Disconnect path (spec §4.G): removes the client record and runs
    /// subscription cleanup. Per the default policy (spec §9 open
    /// question, resolved in DESIGN.md), the conversation session itself
    /// is left for the idle sweeper so reconnects can resume.
    pub async fn disconnect(&self, session_id: &str) {
        self.connections.unregister(session_id);
        self.price.disconnect(session_id).await;
    }

    /// Routes one inbound text frame (spec §4.G frame routing). Never
    /// closes the connection, even on malformed input.
    pub async fn handle_inbound(&self, session_id: &str, sink: &dyn ClientSink, text: &str) {
        match parse_inbound(text) {
            Ok(InboundFrame::Ping { id }) => {
                self.metrics.record_request("PING", "/ws", 200);
                sink.send_json(pong(&id)).await;
            }
            Ok(InboundFrame::UserMessage { content }) => {
                self.metrics.record_request("USER_MESSAGE", "/ws", 200);
                let reply = self.conversation.process_message(session_id, &content, None).await;
                sink.send_json(assistant_message(&reply)).await;
            }
            Ok(InboundFrame::Subscribe { symbols }) => {
                self.metrics.record_request("SUBSCRIBE", "/ws", 200);
                self.price.subscribe(session_id, symbols).await;
            }
            Ok(InboundFrame::Unsubscribe { symbols }) => {
                self.metrics.record_request("UNSUBSCRIBE", "/ws", 200);
                self.price.unsubscribe(session_id, symbols).await;
            }
            Ok(InboundFrame::GetSubscriptions) => {
                self.metrics.record_request("GET_SUBSCRIPTIONS", "/ws", 200);
                let symbols = self.price.get_subscriptions(session_id).await;
                sink.send_json(json!({"type": "GET_SUBSCRIPTIONS", "symbols": symbols, "timestamp": now_ms()}))
                    .await;
            }
            Err(FrameError::MalformedJson) => {
                self.metrics.record_request("UNKNOWN", "/ws", 400);
                self.metrics
                    .record_error(&ErrorCode::WebsocketError.to_string(), "/ws", "malformed JSON frame", now_ms());
                sink.send_json(error_frame("Malformed JSON frame", ErrorCode::WebsocketError, 400, None))
                    .await;
            }
            Err(FrameError::UnknownType(kind)) => {
                self.metrics.record_request(&kind, "/ws", 400);
                self.metrics.record_error(
                    &ErrorCode::WebsocketError.to_string(),
                    "/ws",
                    &format!("unknown frame type \"{kind}\""),
                    now_ms(),
                );
                sink.send_json(error_frame(
                    &format!("Unknown frame type \"{kind}\""),
                    ErrorCode::WebsocketError,
                    400,
                    None,
                ))
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_llm::mock::ScriptedAdapter;
    use gateway_llm::LlmResponse;
    use gateway_price::PriceFeedAdapter;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::Value;

    struct RecordingSink {
        frames: SyncMutex<Vec<Value>>,
    }
    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: SyncMutex::new(Vec::new()),
            })
        }
    }
    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send_json(&self, value: Value) {
            self.frames.lock().push(value);
        }
    }

    struct NoopFeed;
    #[async_trait]
    impl PriceFeedAdapter for NoopFeed {
        fn supported_symbols(&self) -> Vec<String> {
            vec!["BTC".to_string()]
        }
        async fn fetch_current_price(&self, symbol: &str) -> Result<Value, gateway_price::PriceFeedError> {
            Ok(json!({"symbol": symbol, "price": 1}))
        }
        async fn open_subscription(
            &self,
            _symbol: &str,
            _sender: tokio::sync::mpsc::UnboundedSender<(String, gateway_price::UpstreamEvent)>,
        ) -> Result<(), gateway_price::PriceFeedError> {
            Ok(())
        }
        async fn close_subscription(&self, _symbol: &str) {}
    }

    fn test_hub() -> WsHub {
        let llm = Arc::new(ScriptedAdapter::new(vec![Ok(LlmResponse {
            content: "hi there".to_string(),
            tool_calls: vec![],
        })]));
        let conversation = Arc::new(ConversationManager::new(
            llm,
            Arc::new(gateway_tools::ToolRegistry::new()),
            Default::default(),
        ));
        let (price, _rx) = PriceHub::new(Arc::new(NoopFeed), 10);
        WsHub::new(conversation, price, WsHubConfig::default(), Arc::new(MetricsCollector::new()))
    }

    #[tokio::test]
    async fn ping_yields_pong_with_same_id() {
        let hub = test_hub();
        let sink = RecordingSink::new();
        hub.handle_inbound("s1", sink.as_ref(), r#"{"type":"PING","id":"p1"}"#).await;
        let frames = sink.frames.lock();
        assert_eq!(frames[0]["type"], "PONG");
        assert_eq!(frames[0]["id"], "p1");
    }

    #[tokio::test]
    async fn user_message_yields_assistant_message_frame() {
        let hub = test_hub();
        let sink = RecordingSink::new();
        hub.handle_inbound("s1", sink.as_ref(), r#"{"type":"USER_MESSAGE","content":"hello"}"#)
            .await;
        let frames = sink.frames.lock();
        assert_eq!(frames[0]["type"], "ASSISTANT_MESSAGE");
        assert_eq!(frames[0]["content"], "hi there");
    }

    #[tokio::test]
    async fn malformed_json_yields_error_frame_without_closing() {
        let hub = test_hub();
        let sink = RecordingSink::new();
        hub.handle_inbound("s1", sink.as_ref(), "not json at all").await;
        let frames = sink.frames.lock();
        assert_eq!(frames[0]["type"], "ERROR");
    }

    #[tokio::test]
    async fn unknown_frame_type_yields_error_frame() {
        let hub = test_hub();
        let sink = RecordingSink::new();
        hub.handle_inbound("s1", sink.as_ref(), r#"{"type":"WIGGLE"}"#).await;
        let frames = sink.frames.lock();
        assert_eq!(frames[0]["type"], "ERROR");
    }

    #[tokio::test]
    async fn handle_inbound_records_request_and_error_metrics() {
        let llm = Arc::new(ScriptedAdapter::new(vec![Ok(LlmResponse {
            content: "hi there".to_string(),
            tool_calls: vec![],
        })]));
        let conversation = Arc::new(ConversationManager::new(
            llm,
            Arc::new(gateway_tools::ToolRegistry::new()),
            Default::default(),
        ));
        let (price, _rx) = PriceHub::new(Arc::new(NoopFeed), 10);
        let metrics = Arc::new(MetricsCollector::new());
        let hub = WsHub::new(conversation, price, WsHubConfig::default(), metrics.clone());
        let sink = RecordingSink::new();

        hub.handle_inbound("s1", sink.as_ref(), r#"{"type":"USER_MESSAGE","content":"hello"}"#)
            .await;
        hub.handle_inbound("s1", sink.as_ref(), "not json at all").await;

        let summary = metrics.summary();
        assert_eq!(summary.requests_total, 2);
        assert_eq!(summary.requests_by_endpoint["/ws"], 2);
        assert_eq!(summary.errors_total, 1);
        assert_eq!(summary.errors_by_code["WEBSOCKET_ERROR"], 1);
    }

    #[tokio::test]
    async fn accept_refuses_once_at_capacity_without_touching_existing_connections() {
        let hub = WsHub::new(
            Arc::new(ConversationManager::new(
                Arc::new(ScriptedAdapter::new(vec![])),
                Arc::new(gateway_tools::ToolRegistry::new()),
                Default::default(),
            )),
            PriceHub::new(Arc::new(NoopFeed), 10).0,
            WsHubConfig {
                max_connections: 1,
                ..WsHubConfig::default()
            },
            Arc::new(MetricsCollector::new()),
        );
        let sink_a = RecordingSink::new();
        let sink_b = RecordingSink::new();
        assert!(hub.accept("a", sink_a.clone()).await);
        assert!(!hub.accept("b", sink_b).await);
        assert_eq!(hub.connection_count(), 1);
        assert!(!sink_a.frames.lock().is_empty());
    }
}
