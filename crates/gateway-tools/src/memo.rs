use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use gateway_core::ToolResult;

/// Per-(session, tool, args) memoization of successful tool results
/// (spec §4.C). Owned by the conversation manager; defined here because it
/// gates executor calls. FIFO-evicted once over `max_entries`.
pub struct ToolMemoCache {
    ttl: Duration,
    max_entries: usize,
    order: VecDeque<String>,
    entries: HashMap<String, (ToolResult, Instant)>,
}

impl ToolMemoCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn key(session_id: &str, tool_name: &str, params: &serde_json::Value) -> String {
        format!("{session_id}:{tool_name}:{params}")
    }

    /// Returns a fresh successful result tagged `from_cache=true` /
    /// `data_freshness="cached"` if one exists within `ttl` (spec §8 P10).
    pub fn get(&self, key: &str, now: Instant) -> Option<ToolResult> {
        let (result, inserted_at) = self.entries.get(key)?;
        if now.saturating_duration_since(*inserted_at) > self.ttl {
            return None;
        }
        let mut hit = result.clone();
        hit.from_cache = Some(true);
        hit.data_freshness = Some("cached".to_string());
        Some(hit)
    }

    /// Stores a successful result. Only call this for `result.success`.
    pub fn put(&mut self, key: String, result: ToolResult, now: Instant) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            while self.order.len() > self.max_entries {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(key, (result, now));
    }

    pub fn expire(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (_, t))| now.saturating_duration_since(*t) > self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            self.entries.remove(&k);
            self.order.retain(|o| o != &k);
        }
    }
}

impl Default for ToolMemoCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(120), 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> ToolResult {
        ToolResult {
            tool_name: "get_gas_prices".to_string(),
            arguments: json!({"network": "ethereum"}),
            result: json!({"gwei": 10}),
            execution_time_ms: 5,
            success: true,
            error: None,
            from_cache: Some(false),
            data_freshness: Some("live".to_string()),
        }
    }

    #[test]
    fn fresh_hit_is_tagged_from_cache() {
        let mut memo = ToolMemoCache::new(Duration::from_secs(120), 50);
        let now = Instant::now();
        let key = ToolMemoCache::key("s1", "get_gas_prices", &json!({"network": "ethereum"}));
        memo.put(key.clone(), sample_result(), now);
        let hit = memo.get(&key, now).unwrap();
        assert_eq!(hit.from_cache, Some(true));
        assert_eq!(hit.data_freshness.as_deref(), Some("cached"));
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let mut memo = ToolMemoCache::new(Duration::from_millis(10), 50);
        let now = Instant::now();
        let key = ToolMemoCache::key("s1", "get_gas_prices", &json!({}));
        memo.put(key.clone(), sample_result(), now);
        let later = now + Duration::from_millis(20);
        assert!(memo.get(&key, later).is_none());
    }

    #[test]
    fn fifo_evicts_oldest_over_capacity() {
        let mut memo = ToolMemoCache::new(Duration::from_secs(120), 2);
        let now = Instant::now();
        memo.put("a".to_string(), sample_result(), now);
        memo.put("b".to_string(), sample_result(), now);
        memo.put("c".to_string(), sample_result(), now);
        assert!(memo.get("a", now).is_none());
        assert!(memo.get("b", now).is_some());
        assert!(memo.get("c", now).is_some());
    }
}
