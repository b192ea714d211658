use std::fmt;

/// Error taxonomy shared across the gateway (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConfigurationError,
    LlmError,
    ToolError,
    InvalidParameters,
    ToolNotFound,
    WebsocketError,
    ConversationError,
    SessionError,
    RateLimit,
    NetworkError,
    ServiceUnavailable,
    ValidationError,
    UnknownError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::LlmError => "LLM_ERROR",
            ErrorCode::ToolError => "TOOL_ERROR",
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::WebsocketError => "WEBSOCKET_ERROR",
            ErrorCode::ConversationError => "CONVERSATION_ERROR",
            ErrorCode::SessionError => "SESSION_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        };
        write!(f, "{s}")
    }
}

/// Log severity a classified error maps to (§7 status-code analog).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warn,
    Info,
}

/// Result of classifying a [`GatewayError`]: category, severity, and whether
/// the caller can reasonably retry.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub category: ErrorCode,
    pub severity: Severity,
    pub recoverable: bool,
}

/// The gateway's unified error type. Every component error converts into
/// this at its crate boundary so `classify()` has a single place to live.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("tool error: {0}")]
    Tool(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("websocket error: {0}")]
    Websocket(String),
    #[error("conversation error: {0}")]
    Conversation(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Configuration(_) => ErrorCode::ConfigurationError,
            GatewayError::Llm(_) => ErrorCode::LlmError,
            GatewayError::Tool(_) => ErrorCode::ToolError,
            GatewayError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            GatewayError::ToolNotFound(_) => ErrorCode::ToolNotFound,
            GatewayError::Websocket(_) => ErrorCode::WebsocketError,
            GatewayError::Conversation(_) => ErrorCode::ConversationError,
            GatewayError::Session(_) => ErrorCode::SessionError,
            GatewayError::RateLimit(_) => ErrorCode::RateLimit,
            GatewayError::Network(_) => ErrorCode::NetworkError,
            GatewayError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            GatewayError::Validation(_) => ErrorCode::ValidationError,
            GatewayError::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    /// Classify by the §7 status-code analog: >=500 -> error, 400-499 -> warn, <400 -> info.
    pub fn classify(&self) -> Classification {
        classify_code(self.code())
    }
}

pub fn classify_code(code: ErrorCode) -> Classification {
    use ErrorCode::*;
    let (severity, recoverable) = match code {
        LlmError | ServiceUnavailable | NetworkError | UnknownError | ConversationError => {
            (Severity::Error, true)
        }
        ToolError | RateLimit | SessionError | WebsocketError => (Severity::Warn, true),
        InvalidParameters | ToolNotFound | ValidationError => (Severity::Warn, false),
        ConfigurationError => (Severity::Error, false),
    };
    Classification {
        category: code,
        severity,
        recoverable,
    }
}

/// Canonical user-facing phrase for a classified error code (§4.F error semantics).
/// Never a raw stack trace or internal detail crosses this boundary.
pub fn canonical_message(code: ErrorCode) -> &'static str {
    use ErrorCode::*;
    match code {
        LlmError => "I'm having trouble reaching the language model right now.",
        ToolError => "One of the data lookups I tried didn't come back cleanly.",
        RateLimit => "I'm being rate limited right now — please try again in a moment.",
        NetworkError => "A network issue interrupted that request.",
        ValidationError | InvalidParameters => "That request had some invalid parameters.",
        SessionError => "I lost track of this conversation's session state.",
        ToolNotFound => "I don't have a tool for that yet.",
        WebsocketError => "The connection hit an error while handling that message.",
        ConversationError => "Something went wrong while putting your reply together.",
        ServiceUnavailable => "That service is temporarily unavailable.",
        ConfigurationError => "The gateway is misconfigured.",
        UnknownError => "Something unexpected went wrong.",
    }
}

/// Recovery suggestions shown to the user alongside [`canonical_message`].
pub fn recovery_suggestions(code: ErrorCode) -> Vec<String> {
    use ErrorCode::*;
    let suggestions: &[&str] = match code {
        LlmError | ServiceUnavailable | UnknownError => {
            &["Try again in a few seconds", "Rephrase your message"]
        }
        ToolError => &[
            "Try again shortly",
            "Ask about a different network or token",
        ],
        RateLimit => &["Wait a moment before retrying"],
        NetworkError => &["Check your connection and try again"],
        ValidationError | InvalidParameters => &["Double check the values you provided"],
        SessionError => &["Start a new conversation"],
        ToolNotFound => &["Ask a question covered by an available tool"],
        WebsocketError => &["Reconnect and try again"],
        ConversationError => &["Try rephrasing your message"],
        ConfigurationError => &["Contact the operator of this gateway"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}
