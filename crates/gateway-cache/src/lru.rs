use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// A cached value plus its bookkeeping (spec §3 CacheEntry). `expires_at >
/// inserted_at` is maintained by construction.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub size_bytes: usize,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A single-namespace insertion-ordered cache with LRU eviction, TTL, and an
/// approximate memory cap (spec §4.B). `IndexMap` gives us O(1) lookup while
/// letting us move the most-recently-used entry to the back and evict from
/// the front, so insertion order doubles as LRU order.
#[derive(Debug)]
pub struct LruCache<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    max_size: usize,
    default_ttl: Duration,
    max_memory_bytes: usize,
    current_bytes: usize,
}

impl<V: Clone> LruCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration, max_memory_bytes: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            max_size,
            default_ttl,
            max_memory_bytes,
            current_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.current_bytes
    }

    /// Returns the value if present and unexpired, marking it
    /// most-recently-used. Expired entries are removed and treated as a
    /// miss (spec §3 CacheEntry invariant, §8 P2).
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let idx = self.entries.get_index_of(key)?;
        if self.entries[idx].is_expired(now) {
            self.remove_at(idx);
            return None;
        }
        self.entries[idx].last_accessed = now;
        // Move to the back = most-recently-used.
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        Some(self.entries[last].value.clone())
    }

    pub fn has(&mut self, key: &str, now: Instant) -> bool {
        self.get(key, now).is_some()
    }

    /// Inserts or updates `key`. After insertion, evicts least-recently-used
    /// entries while over `max_size` or `max_memory_bytes` (spec §4.B, §8 P1).
    pub fn set(&mut self, key: &str, value: V, ttl: Option<Duration>, size_bytes: usize, now: Instant) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            value,
            inserted_at: now,
            expires_at: now + ttl,
            last_accessed: now,
            size_bytes,
        };
        if let Some(idx) = self.entries.get_index_of(key) {
            self.current_bytes -= self.entries[idx].size_bytes;
            self.current_bytes += size_bytes;
            self.entries[idx] = entry;
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
        } else {
            self.current_bytes += size_bytes;
            self.entries.insert(key.to_string(), entry);
        }
        self.evict_over_capacity();
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if let Some(idx) = self.entries.get_index_of(key) {
            self.remove_at(idx);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_bytes = 0;
    }

    /// Removes all expired entries; leaves only non-expired entries
    /// (spec §4.B cleanup invariant).
    pub fn cleanup(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        let removed = expired.len();
        for key in expired {
            self.delete(&key);
        }
        removed
    }

    /// Evicts the `count` least-recently-used (front-most) entries, for use
    /// by the cache manager's global priority eviction (spec §4.B). Returns
    /// the number actually evicted.
    pub fn evict_lru(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        for _ in 0..count {
            if self.entries.is_empty() {
                break;
            }
            self.remove_at(0);
            evicted += 1;
        }
        evicted
    }

    fn evict_over_capacity(&mut self) {
        while self.entries.len() > self.max_size || self.current_bytes > self.max_memory_bytes {
            if self.entries.is_empty() {
                break;
            }
            self.remove_at(0);
        }
    }

    fn remove_at(&mut self, idx: usize) {
        if let Some((_, entry)) = self.entries.shift_remove_index(idx) {
            self.current_bytes -= entry.size_bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_on_overflow() {
        let mut cache: LruCache<i32> = LruCache::new(2, Duration::from_secs(60), 1_000_000);
        let t0 = Instant::now();
        cache.set("a", 1, None, 1, t0);
        cache.set("b", 2, None, 1, t0);
        // touch "a" so "b" becomes least-recently-used
        assert_eq!(cache.get("a", t0), Some(1));
        cache.set("c", 3, None, 1, t0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b", t0), None);
        assert_eq!(cache.get("a", t0), Some(1));
        assert_eq!(cache.get("c", t0), Some(3));
    }

    #[test]
    fn expired_entries_are_a_miss_and_removed() {
        let mut cache: LruCache<i32> = LruCache::new(10, Duration::from_millis(10), 1_000_000);
        let t0 = Instant::now();
        cache.set("a", 1, Some(Duration::from_millis(5)), 1, t0);
        let t1 = t0 + Duration::from_millis(6);
        assert_eq!(cache.get("a", t1), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn cleanup_leaves_only_unexpired_entries() {
        let mut cache: LruCache<i32> = LruCache::new(10, Duration::from_millis(10), 1_000_000);
        let t0 = Instant::now();
        cache.set("a", 1, Some(Duration::from_millis(5)), 1, t0);
        cache.set("b", 2, Some(Duration::from_secs(60)), 1, t0);
        let t1 = t0 + Duration::from_millis(6);
        cache.cleanup(t1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b", t1), Some(2));
    }
}
