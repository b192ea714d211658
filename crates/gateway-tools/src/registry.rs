use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use gateway_core::{ErrorDescriptor, ErrorCode, ToolResult};

use crate::executor::{execute_with_retry, ToolErrorCode, ToolExecutor};
use crate::schema::{validate, ToolSchema};

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: Option<ToolSchema>,
    pub executor: Arc<dyn ToolExecutor>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("tool registration rejected: {0}")]
    InvalidRegistration(String),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

/// Tool catalog keyed by name (spec §4.C). Registration is append-only —
/// there is deliberately no `unregister`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

/// Tunables for the retry loop (spec §4.C defaults: 2 retries, base delay
/// unspecified numerically — 200ms is this gateway's default).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition`. Fails with `InvalidRegistration` on an empty
    /// name or a duplicate (spec §4.C: "registration is append-only").
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if definition.name.trim().is_empty() {
            return Err(RegistryError::InvalidRegistration(
                "tool name must be non-empty".to_string(),
            ));
        }
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::InvalidRegistration(format!(
                "tool \"{}\" is already registered",
                definition.name
            )));
        }
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.tools
            .values()
            .map(|t| (t.name.as_str(), t.description.as_str()))
            .collect()
    }

    /// All registered definitions, for building an LLM-facing tool catalog
    /// (spec §4.F step 5).
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Executes `name` with `params`: validates against the registered
    /// schema (spec §4.C step 2), then runs the retrying executor (step 3).
    /// Never executes on a validation failure.
    pub async fn execute_tool(
        &self,
        name: &str,
        params: Value,
        config: ExecutorConfig,
    ) -> Result<ToolResult, RegistryError> {
        let def = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        if let Some(schema) = &def.schema {
            if let Err(problems) = validate(schema, &params) {
                return Ok(ToolResult {
                    tool_name: name.to_string(),
                    arguments: params,
                    result: Value::Null,
                    execution_time_ms: 0,
                    success: false,
                    error: Some(ErrorDescriptor {
                        code: ErrorCode::InvalidParameters,
                        message: format!("Invalid parameters: {problems}"),
                        retryable: false,
                        suggestions: vec!["Double check the values you provided".to_string()],
                    }),
                    from_cache: None,
                    data_freshness: None,
                });
            }
        }

        let start = Instant::now();
        let outcome = execute_with_retry(
            def.executor.as_ref(),
            params.clone(),
            config.max_retries,
            config.base_delay,
        )
        .await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        Ok(match outcome {
            Ok(result) => ToolResult {
                tool_name: name.to_string(),
                arguments: params,
                result,
                execution_time_ms,
                success: true,
                error: None,
                from_cache: Some(false),
                data_freshness: Some("live".to_string()),
            },
            Err(e) => ToolResult {
                tool_name: name.to_string(),
                arguments: params,
                result: Value::Null,
                execution_time_ms,
                success: false,
                error: Some(ErrorDescriptor {
                    code: ErrorCode::ToolError,
                    message: e.message.clone(),
                    retryable: e.code.is_retryable(),
                    suggestions: recovery_suggestions(e.code),
                }),
                from_cache: None,
                data_freshness: None,
            },
        })
    }
}

fn recovery_suggestions(code: ToolErrorCode) -> Vec<String> {
    let suggestions: &[&str] = match code {
        ToolErrorCode::NetworkError => &["Check connectivity and try again"],
        ToolErrorCode::RateLimit => &["Wait a moment before retrying"],
        ToolErrorCode::ServiceUnavailable => &["The upstream service is down; try again shortly"],
        ToolErrorCode::InvalidParameters => &["Double check the values you provided"],
        ToolErrorCode::Other => &["Try again or ask a different question"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolExecutionError;
    use crate::schema::{ParamSpec, ParamType};
    use async_trait::async_trait;

    struct Echo;
    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found_before_any_execution() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute_tool("nope", Value::Null, ExecutorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn invalid_params_short_circuit_before_executor_runs() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition {
                name: "get_token_balance".to_string(),
                description: "".to_string(),
                schema: Some(ToolSchema::new(vec![ParamSpec::required(
                    "address",
                    ParamType::String,
                )
                .with_pattern(r"^0x[a-fA-F0-9]{40}$")])),
                executor: Arc::new(Echo),
            })
            .unwrap();
        let result = registry
            .execute_tool(
                "get_token_balance",
                serde_json::json!({"address": "not-an-address"}),
                ExecutorConfig::default(),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, ErrorCode::InvalidParameters);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        let def = || ToolDefinition {
            name: "t".to_string(),
            description: "".to_string(),
            schema: None,
            executor: Arc::new(Echo),
        };
        registry.register(def()).unwrap();
        assert!(registry.register(def()).is_err());
    }
}
