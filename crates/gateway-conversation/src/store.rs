use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gateway_core::{Session, SessionId};
use parking_lot::RwLock;
use tokio::sync::Mutex;

/// Session map (spec §5: "many readers, single writer per session id").
/// Each session is behind its own mutex so unrelated sessions never
/// contend; the outer `RwLock` only guards the map's shape (insert/remove).
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    /// Lifetime message count (spec §6 `/metrics` `conversations.totalMessages`).
    /// Tracked here rather than per-`Session` so it survives `sweep_idle`
    /// removing the session that produced the messages.
    total_messages: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `session_id`, creating a fresh session if
    /// absent (spec §4.F step 1).
    pub fn get_or_create(&self, session_id: &str, now_ms: i64) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().get(session_id) {
            return existing.clone();
        }
        self.sessions
            .write()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id.to_string(), now_ms, None))))
            .clone()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record_message(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_message_count(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    /// Deletes every session idle longer than `session_timeout_ms` (spec
    /// §4.F "Session lifecycle"). Sessions currently mid-`processMessage`
    /// are skipped this pass and swept on the next tick instead of blocking
    /// on their lock.
    pub fn sweep_idle(&self, now_ms: i64, session_timeout_ms: i64) -> Vec<SessionId> {
        let snapshot: Vec<(SessionId, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let mut idle = Vec::new();
        for (id, handle) in snapshot {
            if let Ok(session) = handle.try_lock() {
                if session.is_idle(now_ms, session_timeout_ms) {
                    idle.push(id);
                }
            }
        }
        let mut sessions = self.sessions.write();
        for id in &idle {
            sessions.remove(id);
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_handle_for_same_id() {
        let store = SessionStore::new();
        let a = store.get_or_create("s1", 0);
        let b = store.get_or_create("s1", 0);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn sweep_idle_removes_only_expired_sessions() {
        let store = SessionStore::new();
        let fresh = store.get_or_create("fresh", 1_000);
        let stale = store.get_or_create("stale", 0);
        fresh.lock().await.touch(1_000);
        stale.lock().await.touch(0);

        let removed = store.sweep_idle(10_000, 1_000);
        assert_eq!(removed, vec!["stale".to_string()]);
        assert!(store.contains("fresh"));
        assert!(!store.contains("stale"));
    }

    #[tokio::test]
    async fn total_message_count_survives_session_removal() {
        let store = SessionStore::new();
        let stale = store.get_or_create("stale", 0);
        stale.lock().await.touch(0);
        store.record_message();
        store.record_message();

        store.sweep_idle(10_000, 1_000);
        assert!(!store.contains("stale"));
        assert_eq!(store.total_message_count(), 2);
    }
}
