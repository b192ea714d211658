use std::collections::HashMap;
use std::sync::Arc;

use gateway_price::ClientSink;
use parking_lot::RwLock;

pub type ConnectionId = String;

/// Live WebSocket connections (spec §4.G "construct a client record...
/// register it"). `maxConnections` is enforced at accept time; nothing
/// here ever evicts an existing connection to make room.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<dyn ClientSink>>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at_capacity(&self) -> bool {
        self.len() >= self.max_connections
    }

    pub fn register(&self, id: impl Into<ConnectionId>, sink: Arc<dyn ClientSink>) {
        self.connections.write().insert(id.into(), sink);
    }

    pub fn unregister(&self, id: &str) {
        self.connections.write().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.read().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NullSink;
    #[async_trait]
    impl ClientSink for NullSink {
        async fn send_json(&self, _value: Value) {}
    }

    #[test]
    fn at_capacity_reflects_max_connections_cap() {
        let registry = ConnectionRegistry::new(2);
        registry.register("a", Arc::new(NullSink));
        assert!(!registry.at_capacity());
        registry.register("b", Arc::new(NullSink));
        assert!(registry.at_capacity());
    }

    #[test]
    fn unregister_frees_capacity_for_new_connections() {
        let registry = ConnectionRegistry::new(1);
        registry.register("a", Arc::new(NullSink));
        assert!(registry.at_capacity());
        registry.unregister("a");
        assert!(!registry.at_capacity());
    }
}
