use std::collections::HashMap;

use serde_json::Value;

use crate::message::{Message, SessionId};

/// Per-conversation context bundle owned by the conversation manager
/// (spec §3 Session). The WebSocket hub holds only the id.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub created_at_ms: i64,
    pub last_activity_ms: i64,
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
    /// Opaque per-tool state bag (spec §3), e.g. last-seen pagination cursors.
    pub tool_state: HashMap<String, Value>,
}

impl Session {
    pub fn new(id: SessionId, now_ms: i64, user_id: Option<String>) -> Self {
        Self {
            id,
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
            user_id,
            messages: Vec::new(),
            tool_state: HashMap::new(),
        }
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_activity_ms = now_ms;
    }

    pub fn is_idle(&self, now_ms: i64, session_timeout_ms: i64) -> bool {
        now_ms - self.last_activity_ms > session_timeout_ms
    }

    /// Appends `message` then trims to `max_history_length`, dropping oldest
    /// non-tool / non-tool-call-bearing entries first (spec §4.F step 3,
    /// §8 P6). Invariant: `session.messages.len() <= max_history_length` on
    /// return.
    pub fn append_trimmed(&mut self, message: Message, max_history_length: usize) {
        self.messages.push(message);
        trim_history(&mut self.messages, max_history_length);
    }
}

/// Drops oldest droppable messages until `messages.len() <= max_len`.
/// "Droppable" first means not `carries_tool_context()`; once none remain,
/// falls back to dropping the oldest overall (spec §4.F step 3).
pub fn trim_history(messages: &mut Vec<Message>, max_len: usize) {
    while messages.len() > max_len {
        if let Some(idx) = messages.iter().position(|m| !m.carries_tool_context()) {
            messages.remove(idx);
        } else {
            messages.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Role, ToolCall};

    fn msg(role: Role, id: &str, ts: i64, tool_calls: Option<Vec<ToolCall>>) -> Message {
        Message {
            id: id.to_string(),
            role,
            content: String::new(),
            timestamp_ms: ts,
            tool_calls,
            tool_call_id: None,
            tool_name: None,
            ui_intents: None,
            tool_results: None,
            context: None,
            error: None,
        }
    }

    #[test]
    fn trims_plain_messages_before_tool_messages() {
        let mut messages = vec![
            msg(Role::User, "u1", 1, None),
            msg(Role::Tool, "t1", 2, None),
            msg(Role::User, "u2", 3, None),
            msg(Role::Assistant, "a1", 4, None),
        ];
        trim_history(&mut messages, 2);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.id == "t1"));
    }

    #[test]
    fn falls_back_to_oldest_overall_once_nothing_droppable_remains() {
        let mut messages = vec![
            msg(Role::Tool, "t1", 1, None),
            msg(
                Role::Assistant,
                "a1",
                2,
                Some(vec![ToolCall {
                    id: "c1".into(),
                    name: "x".into(),
                    arguments: serde_json::json!({}),
                }]),
            ),
            msg(Role::Tool, "t2", 3, None),
        ];
        trim_history(&mut messages, 2);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "a1");
    }

    #[test]
    fn at_rest_invariant_holds_after_append() {
        let mut session = Session::new("s1".into(), 0, None);
        for i in 0..10 {
            session.append_trimmed(msg(Role::User, &format!("u{i}"), i as i64, None), 3);
        }
        assert!(session.messages.len() <= 3);
    }
}
