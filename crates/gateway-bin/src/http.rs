//! Health/metrics HTTP surface (spec §2.5, §6). Thin wrappers with no
//! independent business logic — they read already-computed component state.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment_str(),
        "timestamp": gateway_core::now_ms(),
    }))
}

pub async fn health_detailed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let connections = state.ws_hub.connection_count();
    let at_capacity = connections >= state.config.ws_max_connections;
    let websocket_status = if at_capacity { "degraded" } else { "healthy" };
    let overall = if at_capacity { "degraded" } else { "healthy" };
    let status_code = if at_capacity { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };

    let body = json!({
        "status": overall,
        "components": {
            "server": "healthy",
            "websocket": websocket_status,
        },
    });
    (status_code, Json(body))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = state.metrics.summary();
    let uptime = state.started_at.elapsed().as_secs();
    let connections = state.ws_hub.connection_count();
    let config = state.ws_hub.config();

    Json(json!({
        "success": true,
        "data": {
            "uptime": {
                "seconds": uptime,
                "formatted": format_uptime(uptime),
            },
            "server": summary,
            "websocket": {
                "activeConnections": connections,
                "maxConnections": config.max_connections,
                "connectionUtilization": connections as f64 / config.max_connections.max(1) as f64,
            },
            "conversations": {
                "activeSessions": state.conversation.session_count(),
                "totalMessages": state.conversation.total_message_count(),
            },
            "system": {
                "memory": process_memory(),
            },
            "timestamp": gateway_core::now_ms(),
        }
    }))
}

fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Process memory usage in bytes, read from `/proc/self/status` (spec §6
/// `/metrics` `system.memory`). `None` on platforms without procfs rather
/// than pulling in a system-info crate for one gauge.
fn process_memory() -> serde_json::Value {
    match std::fs::read_to_string("/proc/self/status") {
        Ok(status) => match parse_vm_rss_bytes(&status) {
            Some(rss_bytes) => json!({"rssBytes": rss_bytes}),
            None => json!({"rssBytes": Value::Null}),
        },
        Err(_) => json!({"rssBytes": Value::Null}),
    }
}

fn parse_vm_rss_bytes(status: &str) -> Option<u64> {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vm_rss_line_into_bytes() {
        let status = "Name:\tgateway\nVmRSS:\t   12345 kB\nVmSize:\t999 kB\n";
        assert_eq!(parse_vm_rss_bytes(status), Some(12345 * 1024));
    }

    #[test]
    fn missing_vm_rss_line_yields_none() {
        assert_eq!(parse_vm_rss_bytes("Name:\tgateway\n"), None);
    }
}
