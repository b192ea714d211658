//! Shared data model and error taxonomy for the conversation gateway.
//!
//! Every other gateway crate depends on this one for the wire-level message
//! types (`Message`, `ToolCall`, `ToolResult`, `UiIntent`) and the shared
//! error classification (spec §3, §7).

pub mod error;
pub mod message;
pub mod session;

pub use error::{classify_code, canonical_message, recovery_suggestions, Classification, ErrorCode, GatewayError, Severity};
pub use message::{ErrorDescriptor, IntentHint, Message, MessageId, Role, SessionId, ToolCall, ToolResult, UiIntent};
pub use session::{trim_history, Session};

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generates a fresh, process-wide-unique opaque identifier (spec §3: a
/// session id is "unique across the process lifetime").
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
