use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use gateway_core::now_ms;

use crate::adapter::{PriceFeedAdapter, UpstreamEvent};
use crate::sink::ClientSink;

pub type ClientId = String;

#[derive(Default)]
struct Inner {
    client_subscriptions: HashMap<ClientId, HashSet<String>>,
    symbol_subscribers: HashMap<String, HashSet<ClientId>>,
    upstream_open: HashSet<String>,
    clients: HashMap<ClientId, Arc<dyn ClientSink>>,
}

/// Bidirectional subscription index and fan-out hub (spec §4.H). State is
/// guarded by a single async mutex: every operation here is cheap (map
/// bookkeeping plus the occasional upstream call), so contention is not a
/// concern relative to the LLM/tool suspension points elsewhere.
pub struct PriceHub {
    inner: Mutex<Inner>,
    adapter: Arc<dyn PriceFeedAdapter>,
    max_subscriptions_per_client: usize,
    dispatch_tx: mpsc::UnboundedSender<(String, UpstreamEvent)>,
}

impl PriceHub {
    /// Builds the hub and returns the receiving half of its dispatch
    /// channel. The caller is expected to spawn [`run_dispatcher`] exactly
    /// once during startup (spec §9: explicit construction, no background
    /// magic) — this crate never spawns on its own.
    pub fn new(
        adapter: Arc<dyn PriceFeedAdapter>,
        max_subscriptions_per_client: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, UpstreamEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            adapter,
            max_subscriptions_per_client,
            dispatch_tx: tx,
        });
        (hub, rx)
    }

    pub async fn register_client(&self, client_id: impl Into<String>, sink: Arc<dyn ClientSink>) {
        self.inner.lock().await.clients.insert(client_id.into(), sink);
    }

    async fn send_to_client(&self, client_id: &str, value: serde_json::Value) {
        let sink = self.inner.lock().await.clients.get(client_id).cloned();
        if let Some(sink) = sink {
            sink.send_json(value).await;
        }
    }

    async fn send_error(&self, client_id: &str, message: &str) {
        self.send_to_client(
            client_id,
            json!({"type": "ERROR", "error": {"message": message}, "timestamp": now_ms()}),
        )
        .await;
    }

    /// `SUBSCRIBE(symbols[])` (spec §4.H).
    pub async fn subscribe(&self, client_id: &str, symbols: Vec<String>) {
        let normalized: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let supported = self.adapter.supported_symbols();
        let valid: Vec<String> = normalized.into_iter().filter(|s| supported.contains(s)).collect();
        if valid.is_empty() {
            self.send_error(client_id, "No valid symbols").await;
            return;
        }

        let mut inner = self.inner.lock().await;
        let existing = inner
            .client_subscriptions
            .get(client_id)
            .cloned()
            .unwrap_or_default();
        let would_add: Vec<String> = valid.iter().cloned().filter(|s| !existing.contains(s)).collect();
        if existing.len() + would_add.len() > self.max_subscriptions_per_client {
            drop(inner);
            self.send_error(client_id, "Subscription limit exceeded").await;
            return;
        }

        for symbol in &valid {
            inner
                .client_subscriptions
                .entry(client_id.to_string())
                .or_default()
                .insert(symbol.clone());
            inner
                .symbol_subscribers
                .entry(symbol.clone())
                .or_default()
                .insert(client_id.to_string());
        }
        let current_subs: Vec<String> = inner
            .client_subscriptions
            .get(client_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        drop(inner);

        for symbol in &would_add {
            self.ensure_upstream_subscription(symbol).await;
            if let Ok(price) = self.adapter.fetch_current_price(symbol).await {
                self.send_to_client(
                    client_id,
                    json!({"type": "price_update", "symbol": symbol, "data": price, "initial": true, "timestamp": now_ms()}),
                )
                .await;
            }
        }
        tracing::debug!(client_id, added = ?would_add, "client subscribed");
        self.send_to_client(
            client_id,
            json!({"type": "subscription_confirmed", "symbols": current_subs, "added": would_add, "timestamp": now_ms()}),
        )
        .await;
    }

    async fn ensure_upstream_subscription(&self, symbol: &str) {
        let mut inner = self.inner.lock().await;
        if inner.upstream_open.contains(symbol) {
            return;
        }
        inner.upstream_open.insert(symbol.to_string());
        drop(inner);

        if self.adapter.open_subscription(symbol, self.dispatch_tx.clone()).await.is_err() {
            self.inner.lock().await.upstream_open.remove(symbol);
        }
    }

    /// `UNSUBSCRIBE(symbols[])` (spec §4.H).
    pub async fn unsubscribe(&self, client_id: &str, symbols: Vec<String>) {
        let normalized: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();

        let mut inner = self.inner.lock().await;
        let mut removed = Vec::new();
        if let Some(set) = inner.client_subscriptions.get_mut(client_id) {
            for s in &normalized {
                if set.remove(s) {
                    removed.push(s.clone());
                }
            }
            if set.is_empty() {
                inner.client_subscriptions.remove(client_id);
            }
        }
        let mut now_orphaned = Vec::new();
        for s in &removed {
            if let Some(subs) = inner.symbol_subscribers.get_mut(s) {
                subs.remove(client_id);
                if subs.is_empty() {
                    inner.symbol_subscribers.remove(s);
                    inner.upstream_open.remove(s);
                    now_orphaned.push(s.clone());
                }
            }
        }
        let current: Vec<String> = inner
            .client_subscriptions
            .get(client_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        drop(inner);

        for s in &now_orphaned {
            self.adapter.close_subscription(s).await;
        }
        self.send_to_client(
            client_id,
            json!({"type": "unsubscription_confirmed", "symbols": current, "removed": removed, "timestamp": now_ms()}),
        )
        .await;
    }

    /// `GET_SUBSCRIPTIONS` (spec §4.H).
    pub async fn get_subscriptions(&self, client_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .client_subscriptions
            .get(client_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    /// Removes `client_id` from every index and cancels any now-orphaned
    /// upstream subscriptions (spec §4.H "On client disconnect").
    pub async fn disconnect(&self, client_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.clients.remove(client_id);
        let symbols = inner.client_subscriptions.remove(client_id).unwrap_or_default();
        let mut now_orphaned = Vec::new();
        for s in symbols {
            if let Some(subs) = inner.symbol_subscribers.get_mut(&s) {
                subs.remove(client_id);
                if subs.is_empty() {
                    inner.symbol_subscribers.remove(&s);
                    inner.upstream_open.remove(&s);
                    now_orphaned.push(s);
                }
            }
        }
        drop(inner);
        for s in &now_orphaned {
            self.adapter.close_subscription(s).await;
        }
    }

    /// `handlePriceUpdate(symbol, msg)` (spec §4.H, §8 P8).
    pub async fn handle_price_update(&self, symbol: &str, event: UpstreamEvent) {
        let subscribers: Vec<ClientId> = self
            .inner
            .lock()
            .await
            .symbol_subscribers
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();

        let frame = match event {
            UpstreamEvent::PriceUpdate(data) => {
                json!({"type": "price_update", "symbol": symbol, "data": data, "timestamp": now_ms()})
            }
            UpstreamEvent::Connection(status) => {
                json!({"type": "connection_status", "symbol": symbol, "status": status, "timestamp": now_ms()})
            }
            UpstreamEvent::Error(message) => {
                json!({"type": "ERROR", "symbol": symbol, "error": {"message": message}, "timestamp": now_ms()})
            }
        };
        for client_id in subscribers {
            self.send_to_client(&client_id, frame.clone()).await;
        }
    }

    #[cfg(test)]
    async fn client_subscriptions_for_test(&self, client_id: &str) -> HashSet<String> {
        self.inner
            .lock()
            .await
            .client_subscriptions
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }

    #[cfg(test)]
    async fn symbol_subscribers_for_test(&self, symbol: &str) -> HashSet<ClientId> {
        self.inner
            .lock()
            .await
            .symbol_subscribers
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }
}

/// Drains the hub's dispatch channel, calling [`PriceHub::handle_price_update`]
/// for every upstream event until the channel closes. Spawn exactly once.
pub async fn run_dispatcher(hub: Arc<PriceHub>, mut rx: mpsc::UnboundedReceiver<(String, UpstreamEvent)>) {
    while let Some((symbol, event)) = rx.recv().await {
        hub.handle_price_update(&symbol, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    struct MockAdapter {
        supported: Vec<String>,
    }

    #[async_trait]
    impl PriceFeedAdapter for MockAdapter {
        fn supported_symbols(&self) -> Vec<String> {
            self.supported.clone()
        }

        async fn fetch_current_price(&self, symbol: &str) -> Result<serde_json::Value, crate::adapter::PriceFeedError> {
            Ok(json!({"symbol": symbol, "price": 100}))
        }

        async fn open_subscription(
            &self,
            _symbol: &str,
            _sender: mpsc::UnboundedSender<(String, UpstreamEvent)>,
        ) -> Result<(), crate::adapter::PriceFeedError> {
            Ok(())
        }

        async fn close_subscription(&self, _symbol: &str) {}
    }

    struct RecordingSink {
        frames: SyncMutex<Vec<serde_json::Value>>,
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
        async fn send_json(&self, value: serde_json::Value) {
            self.frames.lock().push(value);
        }
    }

    fn adapter() -> Arc<dyn PriceFeedAdapter> {
        Arc::new(MockAdapter {
            supported: vec!["BTC".to_string(), "ETH".to_string(), "USDC".to_string()],
        })
    }

    #[tokio::test]
    async fn subscription_mirror_invariant_holds_after_subscribe() {
        let (hub, _rx) = PriceHub::new(adapter(), 10);
        let sink = RecordingSink::new();
        hub.register_client("c1", sink).await;
        hub.subscribe("c1", vec!["btc".to_string(), "eth".to_string()]).await;

        assert_eq!(
            hub.client_subscriptions_for_test("c1").await,
            ["BTC", "ETH"].iter().map(|s| s.to_string()).collect()
        );
        assert!(hub.symbol_subscribers_for_test("BTC").await.contains("c1"));
        assert!(hub.symbol_subscribers_for_test("ETH").await.contains("c1"));
    }

    #[tokio::test]
    async fn round_trip_subscribe_then_unsubscribe_leaves_no_trace() {
        let (hub, _rx) = PriceHub::new(adapter(), 10);
        let sink = RecordingSink::new();
        hub.register_client("c1", sink).await;
        hub.subscribe("c1", vec!["BTC".to_string()]).await;
        hub.unsubscribe("c1", vec!["BTC".to_string()]).await;

        assert!(hub.client_subscriptions_for_test("c1").await.is_empty());
        assert!(hub.symbol_subscribers_for_test("BTC").await.is_empty());
    }

    #[tokio::test]
    async fn fan_out_reaches_only_symbol_subscribers() {
        let (hub, _rx) = PriceHub::new(adapter(), 10);
        let sink1 = RecordingSink::new();
        let sink2 = RecordingSink::new();
        let sink3 = RecordingSink::new();
        hub.register_client("c1", sink1.clone()).await;
        hub.register_client("c2", sink2.clone()).await;
        hub.register_client("c3", sink3.clone()).await;
        hub.subscribe("c1", vec!["BTC".to_string(), "ETH".to_string()]).await;
        hub.subscribe("c2", vec!["BTC".to_string(), "USDC".to_string()]).await;
        hub.subscribe("c3", vec!["ETH".to_string(), "USDC".to_string()]).await;

        hub.handle_price_update("BTC", UpstreamEvent::PriceUpdate(json!({"price": 50000}))).await;

        let count_price_updates = |sink: &RecordingSink| {
            sink.frames
                .lock()
                .iter()
                .filter(|f| f["type"] == "price_update" && f["symbol"] == "BTC" && f["initial"].is_null())
                .count()
        };
        assert_eq!(count_price_updates(&sink1), 1);
        assert_eq!(count_price_updates(&sink2), 1);
        assert_eq!(count_price_updates(&sink3), 0);
    }

    #[tokio::test]
    async fn empty_symbol_list_yields_error_frame() {
        let (hub, _rx) = PriceHub::new(adapter(), 10);
        let sink = RecordingSink::new();
        hub.register_client("c1", sink.clone()).await;
        hub.subscribe("c1", vec!["DOGE".to_string()]).await;
        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "ERROR");
    }

    #[tokio::test]
    async fn disconnect_clears_both_indices() {
        let (hub, _rx) = PriceHub::new(adapter(), 10);
        let sink = RecordingSink::new();
        hub.register_client("c1", sink).await;
        hub.subscribe("c1", vec!["BTC".to_string()]).await;
        hub.disconnect("c1").await;
        assert!(hub.client_subscriptions_for_test("c1").await.is_empty());
        assert!(hub.symbol_subscribers_for_test("BTC").await.is_empty());
    }
}
