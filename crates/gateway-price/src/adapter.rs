use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PriceFeedError {
    #[error("symbol not supported: {0}")]
    UnsupportedSymbol(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// An event pushed by an open upstream subscription, tagged by the symbol
/// it concerns (spec §4.H `handlePriceUpdate(symbol, msg)`).
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    PriceUpdate(Value),
    Connection(String),
    Error(String),
}

/// The price/gas feed this hub sits in front of (external collaborator,
/// spec §1). Concrete implementations speak to a real upstream WebSocket or
/// REST poller; this crate only needs the capability set below.
#[async_trait]
pub trait PriceFeedAdapter: Send + Sync {
    fn supported_symbols(&self) -> Vec<String>;

    async fn fetch_current_price(&self, symbol: &str) -> Result<Value, PriceFeedError>;

    /// Opens an upstream subscription for `symbol`; every event it produces
    /// is sent as `(symbol, event)` on `sender`. Called at most once per
    /// symbol while at least one client subscriber exists.
    async fn open_subscription(
        &self,
        symbol: &str,
        sender: UnboundedSender<(String, UpstreamEvent)>,
    ) -> Result<(), PriceFeedError>;

    /// Cancels the upstream subscription for `symbol` (spec §4.H: "when a
    /// symbol has zero subscribers, cancel the upstream subscription").
    async fn close_subscription(&self, symbol: &str);
}
