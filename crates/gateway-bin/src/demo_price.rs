//! Synthetic [`PriceFeedAdapter`] (spec §4.H). The real upstream price feed
//! is an external collaborator (spec §1); this periodically pushes
//! deterministic synthetic ticks for every open subscription so the
//! WebSocket fan-out path is runnable end to end.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use gateway_price::{PriceFeedAdapter, PriceFeedError, UpstreamEvent};
use gateway_tools::default_schemas::CRYPTO_SYMBOLS;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

pub struct SyntheticPriceFeed {
    tick_interval: Duration,
    subscriptions: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SyntheticPriceFeed {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PriceFeedAdapter for SyntheticPriceFeed {
    fn supported_symbols(&self) -> Vec<String> {
        CRYPTO_SYMBOLS.iter().map(|s| s.to_string()).collect()
    }

    async fn fetch_current_price(&self, symbol: &str) -> Result<serde_json::Value, PriceFeedError> {
        if !CRYPTO_SYMBOLS.contains(&symbol) {
            return Err(PriceFeedError::UnsupportedSymbol(symbol.to_string()));
        }
        Ok(json!({"symbol": symbol, "price": synthetic_price(symbol)}))
    }

    async fn open_subscription(
        &self,
        symbol: &str,
        sender: UnboundedSender<(String, UpstreamEvent)>,
    ) -> Result<(), PriceFeedError> {
        if !CRYPTO_SYMBOLS.contains(&symbol) {
            return Err(PriceFeedError::UnsupportedSymbol(symbol.to_string()));
        }
        let symbol = symbol.to_string();
        let task_symbol = symbol.clone();
        let interval = self.tick_interval;
        let handle: JoinHandle<()> = tokio::spawn(async move {
            let symbol = task_symbol;
            let _ = sender.send((symbol.clone(), UpstreamEvent::Connection("connected".to_string())));
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let price = synthetic_price(&symbol);
                if sender
                    .send((symbol.clone(), UpstreamEvent::PriceUpdate(json!({"symbol": symbol, "price": price}))))
                    .is_err()
                {
                    break;
                }
            }
        });
        self.subscriptions.lock().insert(symbol, handle);
        Ok(())
    }

    async fn close_subscription(&self, symbol: &str) {
        if let Some(handle) = self.subscriptions.lock().remove(symbol) {
            handle.abort();
        }
    }
}

fn synthetic_price(symbol: &str) -> f64 {
    let millis = (chrono::Utc::now().timestamp_millis() / 1000) as f64;
    let seed: f64 = symbol.bytes().map(|b| b as f64).sum();
    let wobble = ((millis / 7.0 + seed).sin() + 1.0) / 2.0;
    (1.0 + seed * 37.0 + wobble * 50.0 * 100.0).round() / 100.0
}
