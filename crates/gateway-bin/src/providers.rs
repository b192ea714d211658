//! Concrete [`LlmAdapter`] implementations for the two supported providers
//! (spec §6 `LLM_PROVIDER ∈ {openai, anthropic}`). These are the external
//! collaborators spec.md §1 leaves unspecified; the shapes below follow
//! each provider's own public chat API, not anything in the core crates.

use std::time::Duration;

use async_trait::async_trait;
use gateway_core::ToolCall;
use gateway_llm::{LlmAdapter, LlmCallOptions, LlmError, LlmMessage, LlmResponse, ToolDescriptor};
use serde_json::{json, Value};

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f32, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }
}

fn openai_tool(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters_schema,
        }
    })
}

fn openai_message(message: &LlmMessage) -> Value {
    let mut obj = json!({"role": message.role, "content": message.content});
    if let Some(tool_call_id) = &message.tool_call_id {
        obj["tool_call_id"] = json!(tool_call_id);
    }
    obj
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        options: LlmCallOptions,
    ) -> Result<LlmResponse, LlmError> {
        let mut payload_messages: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system_prompt) = &options.system_prompt {
            payload_messages.push(json!({"role": "system", "content": system_prompt}));
        }
        payload_messages.extend(messages.iter().map(openai_message));

        let mut body = json!({
            "model": self.model,
            "messages": payload_messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(openai_tool).collect());
        }

        tracing::debug!(session_id = %options.session_id, follow_up = options.follow_up, "calling openai");

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError(format!("openai returned {status}: {text}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| LlmError(format!("openai response was not valid JSON: {e}")))?;
        parse_openai_response(parsed)
    }
}

fn parse_openai_response(parsed: Value) -> Result<LlmResponse, LlmError> {
    let choice = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| LlmError("openai response had no choices".to_string()))?;
    let message = choice.get("message").cloned().unwrap_or(Value::Null);
    let content = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|c| ToolCall {
                    id: c.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    name: c
                        .get("function")
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: c
                        .get("function")
                        .and_then(|f| f.get("arguments"))
                        .and_then(Value::as_str)
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(LlmResponse { content, tool_calls })
}

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicAdapter {
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f32, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }
}

fn anthropic_tool(tool: &ToolDescriptor) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters_schema,
    })
}

#[async_trait]
impl LlmAdapter for AnthropicAdapter {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        options: LlmCallOptions,
    ) -> Result<LlmResponse, LlmError> {
        let payload_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| json!({"role": if m.role == "assistant" { "assistant" } else { "user" }, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": payload_messages,
        });
        if let Some(system_prompt) = &options.system_prompt {
            body["system"] = json!(system_prompt);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(anthropic_tool).collect());
        }

        tracing::debug!(session_id = %options.session_id, follow_up = options.follow_up, "calling anthropic");

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError(format!("anthropic returned {status}: {text}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| LlmError(format!("anthropic response was not valid JSON: {e}")))?;
        parse_anthropic_response(parsed)
    }
}

fn parse_anthropic_response(parsed: Value) -> Result<LlmResponse, LlmError> {
    let blocks = parsed
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError("anthropic response had no content blocks".to_string()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                name: block.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                arguments: block.get("input").cloned().unwrap_or(Value::Null),
            }),
            _ => {}
        }
    }
    Ok(LlmResponse { content, tool_calls })
}
