//! Multi-namespace LRU+TTL cache with priority-ordered global eviction
//! (spec §4.B).

pub mod lru;
pub mod manager;
pub mod strategy;

pub use lru::{CacheEntry, LruCache};
pub use manager::{approx_size, CacheManager, NamespaceConfig, NamespacePriority};
pub use strategy::{effective_ttl, Strategy, StrategyContext, UserTier};
