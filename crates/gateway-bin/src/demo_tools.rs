//! Concrete [`ToolExecutor`] implementations for the four default tools
//! (spec §4.C, §6). The upstream REST adapters these would normally call
//! are external collaborators (spec §1); these stand in with deterministic,
//! synthetic data so the gateway is runnable end to end, while still
//! exercising the shared rate limiter and cache manager the way a real
//! adapter would. Parameter shape (enum membership, address pattern) is
//! already enforced by the schema each tool is registered with, so these
//! bodies trust their input.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use gateway_cache::{CacheManager, StrategyContext};
use gateway_metrics::MetricsCollector;
use gateway_ratelimit::{Decision, RateLimiter};
use gateway_tools::executor::{ToolErrorCode, ToolExecutionError, ToolExecutor};
use parking_lot::Mutex as SyncMutex;
use serde_json::{json, Value};

/// Shared dependencies every demo tool executor reaches through (mirrors
/// how a real upstream adapter would be constructed once and injected into
/// each tool at registration time).
pub struct ToolDeps {
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<SyncMutex<CacheManager>>,
    pub metrics: Arc<MetricsCollector>,
}

fn deterministic_fraction(seed: &str) -> f64 {
    let mut hash: u64 = 1469598103934665603;
    for byte in seed.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash % 10_000) as f64 / 10_000.0
}

async fn admit(deps: &ToolDeps, key: &str) -> Result<(), ToolExecutionError> {
    match deps.rate_limiter.check(key, Instant::now()).await {
        Decision::Allowed { .. } => Ok(()),
        Decision::Denied(_) => {
            deps.metrics.record_rate_limit_exceeded(key);
            Err(ToolExecutionError::new(
                ToolErrorCode::RateLimit,
                format!("rate limit exceeded for \"{key}\""),
            ))
        }
    }
}

/// Cache-or-compute with metrics (spec §4.I cache hit/miss, external-call
/// stats). `namespace` doubles as the external-call provider label since
/// `compute` stands in for the upstream adapter a cache miss would call.
fn cached_or<F>(deps: &ToolDeps, namespace: &str, key: &str, compute: F) -> Value
where
    F: FnOnce() -> Value,
{
    let now = Instant::now();
    {
        let mut cache = deps.cache.lock();
        if let Some(hit) = cache.get(namespace, key, now) {
            deps.metrics.record_cache_hit(namespace);
            return hit;
        }
    }
    deps.metrics.record_cache_miss(namespace);
    let start = Instant::now();
    let value = compute();
    deps.metrics
        .record_external_call(namespace, true, start.elapsed().as_millis() as u64);
    deps.cache.lock().set(namespace, key, value.clone(), StrategyContext::default(), now);
    value
}

pub struct GasPricesExecutor {
    pub deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolExecutor for GasPricesExecutor {
    async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError> {
        let network = params.get("network").and_then(Value::as_str).unwrap_or("ethereum");
        admit(&self.deps, "tools:get_gas_prices").await?;

        let value = cached_or(&self.deps, "gas_prices", network, || {
            let base = 10.0 + deterministic_fraction(network) * 80.0;
            json!({
                "network": network,
                "slow": (base * 0.8).round(),
                "standard": base.round(),
                "fast": (base * 1.3).round(),
                "unit": "gwei",
            })
        });
        Ok(value)
    }
}

pub struct CryptoPriceExecutor {
    pub deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolExecutor for CryptoPriceExecutor {
    async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError> {
        let symbol = params.get("symbol").and_then(Value::as_str).unwrap_or("BTC");
        admit(&self.deps, "tools:get_crypto_price").await?;

        let currency = params.get("currency").and_then(Value::as_str).unwrap_or("USD");
        let key = format!("{symbol}:{currency}");
        let value = cached_or(&self.deps, "crypto_prices", &key, || {
            let price = 1.0 + deterministic_fraction(&key) * 70_000.0;
            json!({
                "symbol": symbol,
                "currency": currency,
                "price": (price * 100.0).round() / 100.0,
            })
        });
        Ok(value)
    }
}

pub struct LendingRatesExecutor {
    pub deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolExecutor for LendingRatesExecutor {
    async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError> {
        let token = params.get("token").and_then(Value::as_str).unwrap_or("USDC");
        admit(&self.deps, "tools:get_lending_rates").await?;

        let value = cached_or(&self.deps, "api_responses", &format!("lending:{token}"), || {
            let apy = deterministic_fraction(token) * 12.0;
            json!({
                "token": token,
                "protocols": [
                    {"protocol": "aave", "supplyApy": (apy * 100.0).round() / 100.0},
                    {"protocol": "compound", "supplyApy": ((apy * 0.9) * 100.0).round() / 100.0},
                ],
            })
        });
        Ok(value)
    }
}

pub struct TokenBalanceExecutor {
    pub deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolExecutor for TokenBalanceExecutor {
    async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError> {
        let address = params.get("address").and_then(Value::as_str).unwrap_or_default();
        admit(&self.deps, "tools:get_token_balance").await?;

        let network = params.get("network").and_then(Value::as_str).unwrap_or("ethereum");
        let key = format!("{network}:{address}");
        let value = cached_or(&self.deps, "token_balances", &key, || {
            let balance = deterministic_fraction(&key) * 5.0;
            json!({
                "address": address,
                "network": network,
                "balance": (balance * 1_000_000.0).round() / 1_000_000.0,
            })
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_ratelimit::{RateLimitKeyConfig, RateLimiter};
    use std::time::Duration;

    fn test_deps() -> Arc<ToolDeps> {
        Arc::new(ToolDeps {
            rate_limiter: Arc::new(RateLimiter::default()),
            cache: Arc::new(SyncMutex::new(CacheManager::new(1_000, 1024 * 1024).with_default_namespaces())),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    #[test]
    fn cached_or_records_miss_then_hit() {
        let deps = test_deps();
        let mut calls = 0;
        let _ = cached_or(&deps, "gas_prices", "ethereum", || {
            calls += 1;
            json!({"network": "ethereum"})
        });
        let _ = cached_or(&deps, "gas_prices", "ethereum", || {
            calls += 1;
            json!({"network": "ethereum"})
        });
        assert_eq!(calls, 1);
        let summary = deps.metrics.summary();
        assert_eq!(summary.cache_misses["gas_prices"], 1);
        assert_eq!(summary.cache_hits["gas_prices"], 1);
        assert_eq!(summary.external_calls["gas_prices"].calls, 1);
    }

    #[tokio::test]
    async fn admit_records_rate_limit_exceeded_on_denial() {
        let deps = test_deps();
        deps.rate_limiter
            .configure_key(RateLimitKeyConfig::new("tools:get_gas_prices".to_string(), 0, Duration::from_secs(60)))
            .await;
        let result = admit(&deps, "tools:get_gas_prices").await;
        assert!(result.is_err());
        let summary = deps.metrics.summary();
        assert_eq!(summary.rate_limit_exceeded["tools:get_gas_prices"], 1);
    }
}
