use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::lru::LruCache;
use crate::strategy::{effective_ttl, Strategy, StrategyContext};

/// Namespace priority, used only for global eviction ordering (spec §4.B):
/// ascending priority namespaces are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamespacePriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    pub max_size: usize,
    pub default_ttl: Duration,
    pub max_memory_bytes: usize,
    pub priority: NamespacePriority,
    pub strategy: Strategy,
}

struct Namespace {
    config: NamespaceConfig,
    cache: LruCache<Value>,
}

/// Routes gets/sets to per-namespace LRU+TTL caches and enforces a combined
/// memory/entry cap across all namespaces (spec §4.B).
pub struct CacheManager {
    namespaces: HashMap<String, Namespace>,
    global_max_entries: usize,
    global_max_memory_bytes: usize,
}

impl CacheManager {
    pub fn new(global_max_entries: usize, global_max_memory_bytes: usize) -> Self {
        Self {
            namespaces: HashMap::new(),
            global_max_entries,
            global_max_memory_bytes,
        }
    }

    /// Registers the well-known namespaces and their preconfigured defaults
    /// (spec §4.B): gas_prices (5m, high), crypto_prices (1m, high),
    /// token_balances (30s, medium), api_responses (10m, low), plus the
    /// frequency-tracking namespace `access_tracking`.
    pub fn with_default_namespaces(mut self) -> Self {
        self.register(
            "gas_prices",
            NamespaceConfig {
                max_size: 500,
                default_ttl: Duration::from_secs(5 * 60),
                max_memory_bytes: 8 * 1024 * 1024,
                priority: NamespacePriority::High,
                strategy: Strategy::TimeBased,
            },
        );
        self.register(
            "crypto_prices",
            NamespaceConfig {
                max_size: 2000,
                default_ttl: Duration::from_secs(60),
                max_memory_bytes: 8 * 1024 * 1024,
                priority: NamespacePriority::High,
                strategy: Strategy::TimeBased,
            },
        );
        self.register(
            "token_balances",
            NamespaceConfig {
                max_size: 2000,
                default_ttl: Duration::from_secs(30),
                max_memory_bytes: 8 * 1024 * 1024,
                priority: NamespacePriority::Medium,
                strategy: Strategy::UserBased,
            },
        );
        self.register(
            "api_responses",
            NamespaceConfig {
                max_size: 5000,
                default_ttl: Duration::from_secs(10 * 60),
                max_memory_bytes: 16 * 1024 * 1024,
                priority: NamespacePriority::Low,
                strategy: Strategy::Lru,
            },
        );
        self.register(
            "access_tracking",
            NamespaceConfig {
                max_size: 10_000,
                default_ttl: Duration::from_secs(60 * 60),
                max_memory_bytes: 4 * 1024 * 1024,
                priority: NamespacePriority::Low,
                strategy: Strategy::Lru,
            },
        );
        self
    }

    pub fn register(&mut self, name: &str, config: NamespaceConfig) {
        let cache = LruCache::new(config.max_size, config.default_ttl, config.max_memory_bytes);
        self.namespaces
            .insert(name.to_string(), Namespace { config, cache });
    }

    pub fn get(&mut self, namespace: &str, key: &str, now: Instant) -> Option<Value> {
        let hit = self.namespaces.get_mut(namespace)?.cache.get(key, now);
        if hit.is_some() {
            self.bump_access_count(key, now);
        }
        hit
    }

    /// Sets `key` in `namespace` after applying that namespace's TTL
    /// strategy (spec §4.B). Returns `false` if the strategy refused to
    /// cache the value (e.g. `conditional` on an empty value).
    pub fn set(&mut self, namespace: &str, key: &str, value: Value, ctx: StrategyContext, now: Instant) -> bool {
        let access_count = self.access_count(key, now);
        let ctx = StrategyContext {
            access_count,
            is_balance_like: ctx.is_balance_like || namespace.contains("balance"),
            ..ctx
        };
        let Some(ns) = self.namespaces.get_mut(namespace) else {
            return false;
        };
        let Some(ttl) = effective_ttl(ns.config.strategy, ns.config.default_ttl, &value, &ctx) else {
            return false;
        };
        let size_bytes = approx_size(&value);
        ns.cache.set(key, value, Some(ttl), size_bytes, now);
        self.enforce_global_caps(now);
        true
    }

    pub fn delete(&mut self, namespace: &str, key: &str) -> bool {
        self.namespaces
            .get_mut(namespace)
            .map(|ns| ns.cache.delete(key))
            .unwrap_or(false)
    }

    pub fn has(&mut self, namespace: &str, key: &str, now: Instant) -> bool {
        self.namespaces
            .get_mut(namespace)
            .map(|ns| ns.cache.has(key, now))
            .unwrap_or(false)
    }

    pub fn clear(&mut self, namespace: &str) {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.cache.clear();
        }
    }

    /// Removes all expired entries in every namespace.
    pub fn cleanup_all(&mut self, now: Instant) -> usize {
        self.namespaces.values_mut().map(|ns| ns.cache.cleanup(now)).sum()
    }

    fn bump_access_count(&mut self, key: &str, now: Instant) {
        let count = self.access_count(key, now) + 1;
        if let Some(tracking) = self.namespaces.get_mut("access_tracking") {
            tracking
                .cache
                .set(key, Value::from(count), None, 8, now);
        }
    }

    fn access_count(&mut self, key: &str, now: Instant) -> u64 {
        self.namespaces
            .get_mut("access_tracking")
            .and_then(|ns| ns.cache.get(key, now))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    fn total_entries(&self) -> usize {
        self.namespaces.values().map(|ns| ns.cache.len()).sum()
    }

    fn total_memory(&self) -> usize {
        self.namespaces.values().map(|ns| ns.cache.memory_bytes()).sum()
    }

    /// Global eviction (spec §4.B): while over combined caps, iterate
    /// namespaces ascending by priority and evict `ceil(10%)` of each in LRU
    /// order, stopping once within limits.
    pub fn enforce_global_caps(&mut self, _now: Instant) {
        if self.total_entries() <= self.global_max_entries
            && self.total_memory() <= self.global_max_memory_bytes
        {
            return;
        }
        let mut ordered: Vec<(String, NamespacePriority)> = self
            .namespaces
            .iter()
            .map(|(name, ns)| (name.clone(), ns.config.priority))
            .collect();
        ordered.sort_by_key(|(_, p)| *p);

        loop {
            if self.total_entries() <= self.global_max_entries
                && self.total_memory() <= self.global_max_memory_bytes
            {
                break;
            }
            let mut evicted_any = false;
            for (name, _) in &ordered {
                if self.total_entries() <= self.global_max_entries
                    && self.total_memory() <= self.global_max_memory_bytes
                {
                    break;
                }
                if let Some(ns) = self.namespaces.get_mut(name) {
                    let to_evict = ((ns.cache.len() as f64) * 0.1).ceil() as usize;
                    if ns.cache.evict_lru(to_evict.max(1)) > 0 {
                        evicted_any = true;
                    }
                }
            }
            if !evicted_any {
                break;
            }
        }
    }
}

/// Approximate byte size of a JSON value via its serialized length; cheap
/// and stable enough for capacity accounting (spec §3 CacheEntry size field).
pub fn approx_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|b| b.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_without_eviction() {
        let mut mgr = CacheManager::new(10_000, 10_000_000).with_default_namespaces();
        let now = Instant::now();
        assert!(mgr.set("api_responses", "k", serde_json::json!({"v": 1}), StrategyContext::default(), now));
        assert_eq!(mgr.get("api_responses", "k", now), Some(serde_json::json!({"v": 1})));
    }

    #[test]
    fn conditional_is_not_configured_for_api_responses_but_balance_strategy_caps_ttl() {
        let mut mgr = CacheManager::new(10_000, 10_000_000).with_default_namespaces();
        let now = Instant::now();
        let ctx = StrategyContext {
            is_balance_like: true,
            ..Default::default()
        };
        assert!(mgr.set("token_balances", "addr", serde_json::json!({"bal": 1}), ctx, now));
        assert!(mgr.get("token_balances", "addr", now).is_some());
    }

    #[test]
    fn global_eviction_drains_low_priority_namespace_first() {
        let mut mgr = CacheManager::new(5, 10_000_000).with_default_namespaces();
        let now = Instant::now();
        for i in 0..10 {
            mgr.set(
                "api_responses",
                &format!("low{i}"),
                serde_json::json!(i),
                StrategyContext::default(),
                now,
            );
        }
        for i in 0..3 {
            mgr.set(
                "gas_prices",
                &format!("high{i}"),
                serde_json::json!(i),
                StrategyContext::default(),
                now,
            );
        }
        assert!(mgr.total_entries() <= 5);
        // high-priority entries should have survived the low-priority drain.
        assert!(mgr.get("gas_prices", "high0", now).is_some());
    }
}
