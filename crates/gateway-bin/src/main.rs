mod config;
mod demo_price;
mod demo_tools;
mod http;
mod providers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use clap::Parser;
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gateway_cache::CacheManager;
use gateway_conversation::{ConversationConfig, ConversationManager};
use gateway_llm::LlmAdapter;
use gateway_metrics::MetricsCollector;
use gateway_price::PriceHub;
use gateway_ratelimit::{RateLimitKeyConfig, RateLimiter};
use gateway_tools::{ExecutorConfig, ToolDefinition, ToolRegistry};
use gateway_ws::{WsHub, WsHubConfig};

use config::{GatewayConfig, LlmProvider, LogFormat};
use demo_price::SyntheticPriceFeed;
use demo_tools::{CryptoPriceExecutor, GasPricesExecutor, LendingRatesExecutor, ToolDeps, TokenBalanceExecutor};

/// Shared handles the HTTP observability surface reads from (spec §2.5).
pub struct AppState {
    pub config: GatewayConfig,
    pub conversation: Arc<ConversationManager>,
    pub ws_hub: Arc<WsHub>,
    pub metrics: Arc<MetricsCollector>,
    pub started_at: Instant,
}

fn init_tracing(config: &GatewayConfig) {
    let default_directives = format!("gateway={},tower_http=info", config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

fn build_tool_registry(config: &GatewayConfig, deps: Arc<ToolDeps>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for name in &config.tools_enabled {
        let definition = match name.as_str() {
            "get_gas_prices" => Some(ToolDefinition {
                name: "get_gas_prices".to_string(),
                description: "Current gas prices for a network, in gwei.".to_string(),
                schema: Some(gateway_tools::default_schemas::get_gas_prices_schema()),
                executor: Arc::new(GasPricesExecutor { deps: deps.clone() }),
            }),
            "get_crypto_price" => Some(ToolDefinition {
                name: "get_crypto_price".to_string(),
                description: "Current spot price for a supported crypto symbol.".to_string(),
                schema: Some(gateway_tools::default_schemas::get_crypto_price_schema()),
                executor: Arc::new(CryptoPriceExecutor { deps: deps.clone() }),
            }),
            "get_lending_rates" => Some(ToolDefinition {
                name: "get_lending_rates".to_string(),
                description: "Current lending supply rates for a token across protocols.".to_string(),
                schema: Some(gateway_tools::default_schemas::get_lending_rates_schema()),
                executor: Arc::new(LendingRatesExecutor { deps: deps.clone() }),
            }),
            "get_token_balance" => Some(ToolDefinition {
                name: "get_token_balance".to_string(),
                description: "Token balance for an address on a network.".to_string(),
                schema: Some(gateway_tools::default_schemas::get_token_balance_schema()),
                executor: Arc::new(TokenBalanceExecutor { deps: deps.clone() }),
            }),
            other => {
                tracing::warn!(tool = other, "TOOLS_ENABLED named an unknown tool, skipping");
                None
            }
        };
        if let Some(definition) = definition {
            if let Err(e) = registry.register(definition) {
                tracing::warn!(error = %e, "tool registration rejected");
            }
        }
    }
    registry
}

fn build_llm_adapter(config: &GatewayConfig) -> Arc<dyn LlmAdapter> {
    let timeout = config.api_timeout();
    match config.llm_provider {
        LlmProvider::Openai => Arc::new(providers::OpenAiAdapter::new(
            config.openai_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
            config.llm_max_tokens,
            config.llm_temperature,
            timeout,
        )),
        LlmProvider::Anthropic => Arc::new(providers::AnthropicAdapter::new(
            config.anthropic_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
            config.llm_max_tokens,
            config.llm_temperature,
            timeout,
        )),
    }
}

async fn run_sweeper(conversation: Arc<ConversationManager>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => conversation.sweep().await,
            _ = shutdown.cancelled() => {
                tracing::info!("sweeper task shutting down");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "configuration invalid, refusing to start");
        return Err(anyhow::anyhow!(e));
    }

    let rate_limiter = Arc::new(RateLimiter::default());
    for name in &config.tools_enabled {
        rate_limiter
            .configure_key(
                RateLimitKeyConfig::new(format!("tools:{name}"), config.tools_rate_limit, Duration::from_secs(60))
                    .with_burst(0.1),
            )
            .await;
    }

    let cache = Arc::new(SyncMutex::new(CacheManager::new(50_000, 64 * 1024 * 1024).with_default_namespaces()));
    let metrics = Arc::new(MetricsCollector::new());
    let tool_deps = Arc::new(ToolDeps {
        rate_limiter,
        cache,
        metrics: metrics.clone(),
    });
    let tools = Arc::new(build_tool_registry(&config, tool_deps));

    let llm = build_llm_adapter(&config);
    let conversation = Arc::new(ConversationManager::new(
        llm,
        tools,
        ConversationConfig {
            executor: ExecutorConfig::default(),
            ..ConversationConfig::default()
        },
    ));

    let price_feed = Arc::new(SyntheticPriceFeed::new(Duration::from_secs(5)));
    let (price_hub, dispatch_rx) = PriceHub::new(price_feed, 50);
    tokio::spawn(gateway_price::run_dispatcher(price_hub.clone(), dispatch_rx));

    let ws_hub = Arc::new(WsHub::new(
        conversation.clone(),
        price_hub,
        WsHubConfig {
            max_connections: config.ws_max_connections,
            ping_interval_ms: config.ws_ping_interval,
            missed_pong_limit: 2,
            message_queue_size: config.ws_message_queue_size,
        },
        metrics.clone(),
    ));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        conversation: conversation.clone(),
        ws_hub: ws_hub.clone(),
        metrics,
        started_at: Instant::now(),
    });

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_sweeper(
        conversation,
        Duration::from_secs(5 * 60),
        shutdown.clone(),
    ));

    let http_routes = Router::new()
        .route("/health", get(http::health))
        .route("/health/detailed", get(http::health_detailed))
        .route("/metrics", get(http::metrics))
        .with_state(app_state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(gateway_ws::ws_handler))
        .with_state(ws_hub);

    let cors = if config.cors_origin == "*" {
        CorsLayer::permissive()
    } else {
        match config.cors_origin.parse::<axum::http::HeaderValue>() {
            Ok(origin) => CorsLayer::new().allow_origin(origin).allow_methods(tower_http::cors::Any),
            Err(_) => {
                tracing::warn!(origin = %config.cors_origin, "CORS_ORIGIN was not a valid header value, falling back to permissive");
                CorsLayer::permissive()
            }
        }
    };

    let app = http_routes.merge(ws_routes).layer(cors);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        environment = config.environment_str(),
        provider = ?config.llm_provider,
        tools = config.tools_enabled.join(","),
        "gateway starting"
    );

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    Ok(())
}
