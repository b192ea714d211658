use std::time::Duration;

use clap::{Parser, ValueEnum};
use gateway_core::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum NodeEnv {
    Development,
    Staging,
    Production,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum LlmProvider {
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Gateway configuration, loaded from the environment (spec §6, §2.3).
/// Mirrors `querymt-service::Args`'s shape but sources every field from an
/// env var rather than a CLI flag, since this binary has no interactive
/// invocation surface.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct GatewayConfig {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "NODE_ENV", value_enum, default_value_t = NodeEnv::Development)]
    pub node_env: NodeEnv,

    #[arg(long, env = "LLM_PROVIDER", value_enum, default_value_t = LlmProvider::Openai)]
    pub llm_provider: LlmProvider,

    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY")]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 1024)]
    pub llm_max_tokens: u32,

    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.7)]
    pub llm_temperature: f32,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, env = "WS_PING_INTERVAL", default_value_t = 30_000)]
    pub ws_ping_interval: i64,

    #[arg(long, env = "WS_MAX_CONNECTIONS", default_value_t = 10_000)]
    pub ws_max_connections: usize,

    #[arg(long, env = "WS_MESSAGE_QUEUE_SIZE", default_value_t = 256)]
    pub ws_message_queue_size: usize,

    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    #[arg(long, env = "API_TIMEOUT", default_value_t = 10_000)]
    pub api_timeout_ms: u64,

    /// Comma-separated tool names to register (spec §6 `TOOLS_ENABLED`).
    #[arg(long, env = "TOOLS_ENABLED", default_value = "get_gas_prices,get_crypto_price,get_lending_rates,get_token_balance", value_delimiter = ',')]
    pub tools_enabled: Vec<String>,

    #[arg(long, env = "TOOLS_RATE_LIMIT", default_value_t = 60)]
    pub tools_rate_limit: u32,
}

impl GatewayConfig {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn environment_str(&self) -> &'static str {
        match self.node_env {
            NodeEnv::Development => "development",
            NodeEnv::Staging => "staging",
            NodeEnv::Production => "production",
            NodeEnv::Test => "test",
        }
    }

    /// Startup validation beyond what clap's `value_parser`s already cover
    /// (spec §2.3: "validation failures surface as CONFIGURATION_ERROR at
    /// startup, not at request time").
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(GatewayError::Configuration(format!(
                "LLM_TEMPERATURE must be within [0, 2], got {}",
                self.llm_temperature
            )));
        }
        let api_key_present = match self.llm_provider {
            LlmProvider::Openai => self.openai_api_key.is_some(),
            LlmProvider::Anthropic => self.anthropic_api_key.is_some(),
        };
        if !api_key_present {
            return Err(GatewayError::Configuration(format!(
                "no API key configured for LLM_PROVIDER={:?}",
                self.llm_provider
            )));
        }
        Ok(())
    }
}
