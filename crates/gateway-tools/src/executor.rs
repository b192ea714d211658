use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// An upstream failure classification used purely to decide retryability
/// (spec §4.C step 3); distinct from the gateway-wide `ErrorCode` taxonomy
/// because only a subset of codes are retryable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorCode {
    NetworkError,
    RateLimit,
    ServiceUnavailable,
    InvalidParameters,
    Other,
}

impl ToolErrorCode {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ToolErrorCode::NetworkError | ToolErrorCode::RateLimit | ToolErrorCode::ServiceUnavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolErrorCode::NetworkError => "NETWORK_ERROR",
            ToolErrorCode::RateLimit => "RATE_LIMIT",
            ToolErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ToolErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ToolErrorCode::Other => "TOOL_ERROR",
        }
    }
}

/// Classifies an HTTP-like status code the way upstream adapters would
/// report one, per spec §4.C step 3 ("HTTP-like status 429/5xx").
pub fn classify_status(status: u16) -> ToolErrorCode {
    match status {
        429 => ToolErrorCode::RateLimit,
        500..=599 => ToolErrorCode::ServiceUnavailable,
        _ => ToolErrorCode::Other,
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ToolExecutionError {
    pub code: ToolErrorCode,
    pub message: String,
}

impl ToolExecutionError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A registered tool's callable body. Implementations reach out to upstream
/// adapters (gas/price/lending/balance APIs); those clients are external
/// collaborators (spec §1) and are injected here behind this trait.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, params: Value) -> Result<Value, ToolExecutionError>;
}

/// Retries `executor.execute(params)` up to `max_retries` additional
/// attempts past the first, retrying only on [`ToolErrorCode::is_retryable`]
/// errors, sleeping `base_delay * 2^attempt` between attempts (spec §4.C
/// step 3).
pub async fn execute_with_retry(
    executor: &dyn ToolExecutor,
    params: Value,
    max_retries: u32,
    base_delay: Duration,
) -> Result<Value, ToolExecutionError> {
    let mut attempt = 0;
    loop {
        match executor.execute(params.clone()).await {
            Ok(v) => return Ok(v),
            Err(e) if e.code.is_retryable() && attempt < max_retries => {
                tracing::debug!(attempt, code = e.code.as_str(), "retrying tool call");
                tokio::time::sleep(base_delay * 2u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
