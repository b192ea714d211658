//! LLM adapter contract (spec §4.D). This crate defines the capability set
//! the conversation manager depends on; concrete provider HTTP clients are
//! external collaborators (spec §1) implementing [`LlmAdapter`].

pub mod mock;

use async_trait::async_trait;
use gateway_core::ToolCall;

/// Options threaded through a single LLM call (spec §4.D).
#[derive(Debug, Clone, Default)]
pub struct LlmCallOptions {
    pub session_id: String,
    pub follow_up: bool,
    pub system_prompt: Option<String>,
}

/// A tool made available to the model for this call; built from the tool
/// registry's catalog (spec §4.C/§4.D).
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A single entry in the message list passed to the model. Distinct from
/// `gateway_core::Message` because adapters only need role/content/tool
/// linkage, not the gateway's UI-intent/error bookkeeping.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("LLM error: {0}")]
pub struct LlmError(pub String);

/// Capability contract for an LLM backend (spec §4.D). All failures are
/// surfaced as `LlmError` (bad-gateway class); a streaming variant may exist
/// on concrete implementations but is not required by the core.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        options: LlmCallOptions,
    ) -> Result<LlmResponse, LlmError>;
}

/// Drops any tool call missing a non-empty `id`, missing a non-empty
/// `name`, or otherwise malformed (spec §4.D tool-call validation at the
/// seam). Surviving calls keep their order; if all are dropped the caller
/// proceeds as if `tool_calls` were empty.
pub fn sanitize_tool_calls(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .filter(|c| {
            let ok = !c.id.trim().is_empty() && !c.name.trim().is_empty();
            if !ok {
                tracing::warn!(id = %c.id, name = %c.name, "dropping malformed tool call");
            }
            ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_calls_missing_id_or_name() {
        let calls = vec![
            ToolCall {
                id: "c1".into(),
                name: "get_gas_prices".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "".into(),
                name: "get_gas_prices".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "c2".into(),
                name: "".into(),
                arguments: json!({}),
            },
        ];
        let survivors = sanitize_tool_calls(calls);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, "c1");
    }
}
