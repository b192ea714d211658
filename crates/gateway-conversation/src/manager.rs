use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use gateway_core::{
    canonical_message, classify_code, new_id, now_ms, recovery_suggestions, ErrorCode,
    ErrorDescriptor, GatewayError, Message, Role, Session, ToolCall, ToolResult,
};
use gateway_llm::{LlmAdapter, LlmCallOptions, LlmMessage, ToolDescriptor, sanitize_tool_calls};
use gateway_tools::{ExecutorConfig, RegistryError, ToolMemoCache, ToolRegistry};

use crate::history::merge_and_trim;
use crate::intent_hint::classify_intent;
use crate::store::SessionStore;
use crate::system_prompt::build_system_prompt;

/// Tunables for [`ConversationManager`] (spec §4.F, §6 env-driven defaults).
#[derive(Debug, Clone, Copy)]
pub struct ConversationConfig {
    pub max_history_length: usize,
    pub session_timeout_ms: i64,
    pub cleanup_interval: Duration,
    pub tool_result_ttl: Duration,
    pub tool_memo_capacity: usize,
    pub tool_concurrency_limit: usize,
    pub executor: ExecutorConfig,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history_length: 50,
            session_timeout_ms: Duration::from_secs(30 * 60).as_millis() as i64,
            cleanup_interval: Duration::from_secs(5 * 60),
            tool_result_ttl: Duration::from_secs(120),
            tool_memo_capacity: 50,
            tool_concurrency_limit: 4,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Owns the session store, tool registry, and LLM adapter, and drives the
/// two-phase LLM/tool loop (spec §4.F).
pub struct ConversationManager {
    sessions: SessionStore,
    llm: Arc<dyn LlmAdapter>,
    tools: Arc<ToolRegistry>,
    memo: AsyncMutex<ToolMemoCache>,
    config: ConversationConfig,
}

fn to_llm_messages(messages: &[Message]) -> Vec<LlmMessage> {
    messages
        .iter()
        .map(|m| LlmMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
                Role::Tool => "tool".to_string(),
            },
            content: m.content.clone(),
            tool_call_id: m.tool_call_id.clone(),
            tool_name: m.tool_name.clone(),
        })
        .collect()
}

impl ConversationManager {
    pub fn new(llm: Arc<dyn LlmAdapter>, tools: Arc<ToolRegistry>, config: ConversationConfig) -> Self {
        Self {
            sessions: SessionStore::new(),
            llm,
            tools,
            memo: AsyncMutex::new(ToolMemoCache::new(config.tool_result_ttl, config.tool_memo_capacity)),
            config,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains(session_id)
    }

    /// Lifetime message count across every session, including ones already
    /// reaped by the idle sweeper (spec §6 `/metrics` `conversations.totalMessages`).
    pub fn total_message_count(&self) -> u64 {
        self.sessions.total_message_count()
    }

    /// Runs the idle-session and tool-memo sweep (spec §4.F "Session
    /// lifecycle"). Intended to be called on `cleanup_interval` by the
    /// caller's scheduler.
    pub async fn sweep(&self) {
        let now = now_ms();
        let removed = self.sessions.sweep_idle(now, self.config.session_timeout_ms);
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "swept idle sessions");
        }
        self.memo.lock().await.expire(Instant::now());
    }

    fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .definitions()
            .map(|def| ToolDescriptor {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters_schema: def
                    .schema
                    .as_ref()
                    .map(|s| s.to_json_value())
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
            .collect()
    }

    /// Public entry point (spec §4.F `processMessage`). Never propagates an
    /// error to the caller: failures are classified, logged, and turned
    /// into a user-facing assistant message that is itself appended to the
    /// session log.
    pub async fn process_message(
        &self,
        session_id: &str,
        user_text: &str,
        external_history: Option<Vec<Message>>,
    ) -> Message {
        match self
            .process_message_inner(session_id, user_text, external_history)
            .await
        {
            Ok(msg) => msg,
            Err(err) => {
                let classification = err.classify();
                tracing::error!(
                    session_id,
                    code = %err.code(),
                    severity = ?classification.severity,
                    error = %err,
                    "processMessage failed"
                );
                let error_msg = Message {
                    id: new_id(),
                    role: Role::Assistant,
                    content: canonical_message(err.code()).to_string(),
                    timestamp_ms: now_ms(),
                    tool_calls: None,
                    tool_call_id: None,
                    tool_name: None,
                    ui_intents: None,
                    tool_results: None,
                    context: None,
                    error: Some(ErrorDescriptor {
                        code: err.code(),
                        message: canonical_message(err.code()).to_string(),
                        retryable: classification.recoverable,
                        suggestions: recovery_suggestions(err.code()),
                    }),
                };
                let session = self.sessions.get_or_create(session_id, now_ms());
                let mut session = session.lock().await;
                session.append_trimmed(error_msg.clone(), self.config.max_history_length);
                self.sessions.record_message();
                error_msg
            }
        }
    }

    async fn process_message_inner(
        &self,
        session_id: &str,
        user_text: &str,
        external_history: Option<Vec<Message>>,
    ) -> Result<Message, GatewayError> {
        let now = now_ms();
        let session_handle = self.sessions.get_or_create(session_id, now);
        let mut session: tokio::sync::MutexGuard<'_, Session> = session_handle.lock().await;
        session.touch(now);

        let user_msg = Message {
            id: new_id(),
            role: Role::User,
            content: user_text.to_string(),
            timestamp_ms: now,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            ui_intents: None,
            tool_results: None,
            context: None,
            error: None,
        };
        session.append_trimmed(user_msg, self.config.max_history_length);
        self.sessions.record_message();

        let intent_hint = classify_intent(user_text);
        let tool_descriptors = self.tool_descriptors();
        let system_prompt = build_system_prompt(&tool_descriptors);

        let first_input = merge_and_trim(&session.messages, external_history.as_deref(), self.config.max_history_length);
        let first = self
            .llm
            .complete(
                &to_llm_messages(&first_input),
                &tool_descriptors,
                LlmCallOptions {
                    session_id: session_id.to_string(),
                    follow_up: false,
                    system_prompt: Some(system_prompt.clone()),
                },
            )
            .await
            .map_err(|e| GatewayError::Llm(e.0))?;

        let surviving_calls = sanitize_tool_calls(first.tool_calls.clone());

        let (final_content, tool_results, tool_names) = if surviving_calls.is_empty() {
            (first.content.clone(), Vec::new(), Vec::new())
        } else {
            session.append_trimmed(
                Message {
                    id: new_id(),
                    role: Role::Assistant,
                    content: first.content.clone(),
                    timestamp_ms: now_ms(),
                    tool_calls: Some(surviving_calls.clone()),
                    tool_call_id: None,
                    tool_name: None,
                    ui_intents: None,
                    tool_results: None,
                    context: None,
                    error: None,
                },
                self.config.max_history_length,
            );
            self.sessions.record_message();

            let pairs = self.execute_tool_calls(session_id, &surviving_calls).await;
            let mut tool_results = Vec::with_capacity(pairs.len());
            let mut tool_names = Vec::with_capacity(pairs.len());
            for (call, result) in &pairs {
                session.append_trimmed(
                    Message {
                        id: new_id(),
                        role: Role::Tool,
                        content: serde_json::to_string(&result.result).unwrap_or_default(),
                        timestamp_ms: now_ms(),
                        tool_calls: None,
                        tool_call_id: Some(call.id.clone()),
                        tool_name: Some(call.name.clone()),
                        ui_intents: None,
                        tool_results: None,
                        context: None,
                        error: None,
                    },
                    self.config.max_history_length,
                );
                self.sessions.record_message();
                tool_names.push(result.tool_name.clone());
                tool_results.push(result.clone());
            }

            let second_input = merge_and_trim(&session.messages, external_history.as_deref(), self.config.max_history_length);
            let second = self
                .llm
                .complete(
                    &to_llm_messages(&second_input),
                    &tool_descriptors,
                    LlmCallOptions {
                        session_id: session_id.to_string(),
                        follow_up: true,
                        system_prompt: Some(system_prompt),
                    },
                )
                .await
                .map_err(|e| GatewayError::Llm(e.0))?;

            (second.content, tool_results, tool_names)
        };

        let ui_intents = gateway_intents::generate_ui_intents(&tool_results, user_text, &final_content);

        let assistant_msg = Message {
            id: new_id(),
            role: Role::Assistant,
            content: final_content,
            timestamp_ms: now_ms(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            ui_intents: if ui_intents.is_empty() { None } else { Some(ui_intents) },
            tool_results: if tool_results.is_empty() { None } else { Some(tool_results) },
            context: Some(json!({
                "intent": {
                    "primary": intent_hint.primary,
                    "confidence": intent_hint.confidence,
                    "suggestedTools": intent_hint.suggested_tools,
                },
                "toolsUsed": tool_names,
            })),
            error: None,
        };
        session.append_trimmed(assistant_msg.clone(), self.config.max_history_length);
        self.sessions.record_message();
        Ok(assistant_msg)
    }

    /// Executes every surviving tool call, bounded to
    /// `tool_concurrency_limit` in flight at once, preserving the input
    /// order in the returned pairs regardless of completion order.
    async fn execute_tool_calls(&self, session_id: &str, calls: &[ToolCall]) -> Vec<(ToolCall, ToolResult)> {
        let concurrency = self.config.tool_concurrency_limit.max(1);
        let mut indexed: Vec<(usize, ToolCall, ToolResult)> = stream::iter(calls.iter().cloned().enumerate())
            .map(|(idx, call)| async move {
                let result = self.execute_single_tool_call(session_id, &call).await;
                (idx, call, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _, _)| *idx);
        indexed.into_iter().map(|(_, call, result)| (call, result)).collect()
    }

    async fn execute_single_tool_call(&self, session_id: &str, call: &ToolCall) -> ToolResult {
        let key = ToolMemoCache::key(session_id, &call.name, &call.arguments);
        {
            let memo = self.memo.lock().await;
            if let Some(hit) = memo.get(&key, Instant::now()) {
                return hit;
            }
        }

        match self
            .tools
            .execute_tool(&call.name, call.arguments.clone(), self.config.executor)
            .await
        {
            Ok(result) => {
                if result.success {
                    self.memo.lock().await.put(key, result.clone(), Instant::now());
                }
                result
            }
            Err(RegistryError::ToolNotFound(name)) => ToolResult {
                tool_name: name.clone(),
                arguments: call.arguments.clone(),
                result: serde_json::Value::Null,
                execution_time_ms: 0,
                success: false,
                error: Some(ErrorDescriptor {
                    code: ErrorCode::ToolNotFound,
                    message: format!("Tool \"{name}\" not found"),
                    retryable: false,
                    suggestions: recovery_suggestions(ErrorCode::ToolNotFound),
                }),
                from_cache: None,
                data_freshness: None,
            },
            Err(RegistryError::InvalidRegistration(msg)) => ToolResult {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: serde_json::Value::Null,
                execution_time_ms: 0,
                success: false,
                error: Some(ErrorDescriptor {
                    code: ErrorCode::ConfigurationError,
                    message: msg,
                    retryable: false,
                    suggestions: recovery_suggestions(ErrorCode::ConfigurationError),
                }),
                from_cache: None,
                data_freshness: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_llm::mock::ScriptedAdapter;
    use gateway_llm::LlmResponse;
    use gateway_tools::{ParamSpec, ParamType, ToolDefinition, ToolExecutionError, ToolExecutor, ToolSchema};
    use async_trait::async_trait;

    struct StubGas;
    #[async_trait]
    impl ToolExecutor for StubGas {
        async fn execute(&self, _params: serde_json::Value) -> Result<serde_json::Value, ToolExecutionError> {
            Ok(json!({
                "network": "ethereum",
                "gasPrices": {"standard": {"gwei": 15, "usd_cost": 0.45}},
                "source": "test",
            }))
        }
    }

    fn registry_with_gas_tool() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition {
                name: "get_gas_prices".to_string(),
                description: "Fetches current gas prices".to_string(),
                schema: Some(ToolSchema::new(vec![ParamSpec::required("network", ParamType::String)])),
                executor: Arc::new(StubGas),
            })
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn healthy_gas_query_yields_one_network_status_intent() {
        let llm = Arc::new(ScriptedAdapter::new(vec![
            Ok(LlmResponse {
                content: "Checking…".to_string(),
                tool_calls: vec![ToolCall {
                    id: "c1".to_string(),
                    name: "get_gas_prices".to_string(),
                    arguments: json!({"network": "ethereum"}),
                }],
            }),
            Ok(LlmResponse {
                content: "Ethereum gas is ~15 gwei standard.".to_string(),
                tool_calls: vec![],
            }),
        ]));
        let manager = ConversationManager::new(llm, registry_with_gas_tool(), ConversationConfig::default());
        let reply = manager
            .process_message("s1", "What's the gas on Ethereum?", None)
            .await;

        assert_eq!(reply.content, "Ethereum gas is ~15 gwei standard.");
        let intents = reply.ui_intents.expect("expected ui intents");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].component, "NetworkStatus");
        assert_eq!(reply.tool_results.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn llm_error_becomes_classified_assistant_message() {
        let llm = Arc::new(ScriptedAdapter::new(vec![Err(gateway_llm::LlmError("boom".to_string()))]));
        let manager = ConversationManager::new(llm, Arc::new(ToolRegistry::new()), ConversationConfig::default());
        let reply = manager.process_message("s1", "hi", None).await;
        assert_eq!(reply.error.as_ref().unwrap().code, ErrorCode::LlmError);
        assert!(reply.error.unwrap().retryable);
    }

    #[tokio::test]
    async fn session_is_destroyed_after_idle_sweep() {
        let llm = Arc::new(ScriptedAdapter::new(vec![Ok(LlmResponse {
            content: "hi".to_string(),
            tool_calls: vec![],
        })]));
        let config = ConversationConfig {
            session_timeout_ms: 1,
            ..ConversationConfig::default()
        };
        let manager = ConversationManager::new(llm, Arc::new(ToolRegistry::new()), config);
        manager.process_message("s1", "hi", None).await;
        assert!(manager.has_session("s1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.sweep().await;
        assert!(!manager.has_session("s1"));
    }

    #[tokio::test]
    async fn total_message_count_counts_user_and_assistant_turns() {
        let llm = Arc::new(ScriptedAdapter::new(vec![Ok(LlmResponse {
            content: "hi".to_string(),
            tool_calls: vec![],
        })]));
        let manager = ConversationManager::new(llm, Arc::new(ToolRegistry::new()), ConversationConfig::default());
        manager.process_message("s1", "hello", None).await;
        assert_eq!(manager.total_message_count(), 2);
    }
}
