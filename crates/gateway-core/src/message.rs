use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

pub type SessionId = String;
pub type MessageId = String;

/// A single message role. Role alternation within a turn follows
/// {user, assistant} with optional interleaved {tool} records (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// An LLM-emitted request to execute a tool with specific arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A descriptor attached to a failed tool invocation or assistant error turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    pub suggestions: Vec<String>,
}

/// Outcome of executing a single tool call (spec §3 ToolResult).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
    pub execution_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_freshness: Option<String>,
}

/// A structured instruction for the client to render a named component
/// (spec §4.E). `type` is always the literal `RENDER_COMPONENT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiIntent {
    #[serde(rename = "type")]
    pub kind: String,
    pub component: String,
    pub props: Value,
}

impl UiIntent {
    pub fn render(component: impl Into<String>, props: Value) -> Self {
        Self {
            kind: "RENDER_COMPONENT".to_string(),
            component: component.into(),
            props,
        }
    }
}

/// Advisory classification of the user's intent, computed before the first
/// LLM call. Does not gate tool availability (spec §4.F step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentHint {
    pub primary: String,
    pub confidence: f32,
    pub suggested_tools: Vec<String>,
}

/// A single entry in a session's chronological message log. Immutable
/// after insertion (spec §3). Field names serialize camelCase to match the
/// wire examples in spec §8 (`uiIntents`, `toolResults`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_intents: Option<Vec<UiIntent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl Message {
    /// True if this message must be preserved under history trimming
    /// pressure (spec §4.F step 3 / §8 P6): tool messages, and assistant
    /// messages carrying tool calls.
    pub fn carries_tool_context(&self) -> bool {
        self.role == Role::Tool
            || (self.role == Role::Assistant
                && self
                    .tool_calls
                    .as_ref()
                    .map(|c| !c.is_empty())
                    .unwrap_or(false))
    }
}
