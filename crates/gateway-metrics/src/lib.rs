//! Process-wide metrics collector (spec §4.I). Single in-memory struct,
//! guarded by a `parking_lot::Mutex` since every update is a short,
//! non-suspending bookkeeping operation (spec §5 "Cache operations and log
//! writes are non-suspending").

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;

const ERROR_RING_CAPACITY: usize = 100;
const RESPONSE_TIME_WINDOW: usize = 1_000;
const HISTOGRAM_BUCKETS_MS: &[u64] = &[10, 50, 100, 200, 500, 1_000, 2_000, 5_000];

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusClassCounts {
    pub informational: u64,
    pub success: u64,
    pub redirect: u64,
    pub client_error: u64,
    pub server_error: u64,
}

impl StatusClassCounts {
    fn record(&mut self, status: u16) {
        match status {
            100..=199 => self.informational += 1,
            200..=299 => self.success += 1,
            300..=399 => self.redirect += 1,
            400..=499 => self.client_error += 1,
            _ => self.server_error += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub code: String,
    pub endpoint: String,
    pub message: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternalApiStats {
    pub calls: u64,
    pub failures: u64,
    pub total_response_time_ms: u64,
}

impl ExternalApiStats {
    pub fn average_response_time_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / self.calls as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseTimeHistogram {
    /// `buckets[i]` counts samples with `ms <= HISTOGRAM_BUCKETS_MS[i]`;
    /// the final entry is the overflow bucket (`> 5000`).
    pub buckets: Vec<(String, u64)>,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub sample_count: usize,
}

#[derive(Default)]
struct Inner {
    requests_total: u64,
    requests_by_method: HashMap<String, u64>,
    requests_by_endpoint: HashMap<String, u64>,
    requests_by_status_class: StatusClassCounts,
    errors_total: u64,
    errors_by_code: HashMap<String, u64>,
    errors_by_endpoint: HashMap<String, u64>,
    error_ring: VecDeque<ErrorRecord>,
    rate_limit_exceeded: HashMap<String, u64>,
    cache_hits: HashMap<String, u64>,
    cache_misses: HashMap<String, u64>,
    external_calls: HashMap<String, ExternalApiStats>,
    response_times: VecDeque<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub requests_total: u64,
    pub requests_by_method: HashMap<String, u64>,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub requests_by_status_class: StatusClassCounts,
    pub errors_total: u64,
    pub errors_by_code: HashMap<String, u64>,
    pub errors_by_endpoint: HashMap<String, u64>,
    pub recent_errors: Vec<ErrorRecord>,
    pub rate_limit_exceeded: HashMap<String, u64>,
    pub cache_hits: HashMap<String, u64>,
    pub cache_misses: HashMap<String, u64>,
    pub external_calls: HashMap<String, ExternalApiStats>,
    pub response_times: ResponseTimeHistogram,
}

/// Process-wide metrics (spec §4.I). Cheap to clone out a point-in-time
/// [`MetricsSummary`] for the `/metrics` HTTP surface (spec §2.5).
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: u16) {
        let mut inner = self.inner.lock();
        inner.requests_total += 1;
        *inner.requests_by_method.entry(method.to_string()).or_insert(0) += 1;
        *inner.requests_by_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
        inner.requests_by_status_class.record(status);
    }

    pub fn record_error(&self, code: &str, endpoint: &str, message: &str, now_ms: i64) {
        let mut inner = self.inner.lock();
        inner.errors_total += 1;
        *inner.errors_by_code.entry(code.to_string()).or_insert(0) += 1;
        *inner.errors_by_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
        if inner.error_ring.len() >= ERROR_RING_CAPACITY {
            inner.error_ring.pop_front();
        }
        inner.error_ring.push_back(ErrorRecord {
            code: code.to_string(),
            endpoint: endpoint.to_string(),
            message: message.to_string(),
            timestamp_ms: now_ms,
        });
    }

    pub fn record_rate_limit_exceeded(&self, key: &str) {
        *self.inner.lock().rate_limit_exceeded.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self, namespace: &str) {
        *self.inner.lock().cache_hits.entry(namespace.to_string()).or_insert(0) += 1;
    }

    pub fn record_cache_miss(&self, namespace: &str) {
        *self.inner.lock().cache_misses.entry(namespace.to_string()).or_insert(0) += 1;
    }

    pub fn record_external_call(&self, provider: &str, success: bool, response_time_ms: u64) {
        let mut inner = self.inner.lock();
        let stats = inner.external_calls.entry(provider.to_string()).or_default();
        stats.calls += 1;
        if !success {
            stats.failures += 1;
        }
        stats.total_response_time_ms += response_time_ms;
    }

    /// Pushes one sample into the rolling window of the last
    /// [`RESPONSE_TIME_WINDOW`] response times (spec §4.I).
    pub fn record_response_time(&self, ms: u64) {
        let mut inner = self.inner.lock();
        if inner.response_times.len() >= RESPONSE_TIME_WINDOW {
            inner.response_times.pop_front();
        }
        inner.response_times.push_back(ms);
    }

    fn histogram(samples: &VecDeque<u64>) -> ResponseTimeHistogram {
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();

        let mut buckets = Vec::with_capacity(HISTOGRAM_BUCKETS_MS.len() + 1);
        let mut previous_cutoff = 0u64;
        for &cutoff in HISTOGRAM_BUCKETS_MS {
            let count = sorted.iter().filter(|&&v| v > previous_cutoff && v <= cutoff).count() as u64;
            buckets.push((cutoff.to_string(), count));
            previous_cutoff = cutoff;
        }
        let overflow = sorted.iter().filter(|&&v| v > previous_cutoff).count() as u64;
        buckets.push(("inf".to_string(), overflow));

        ResponseTimeHistogram {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            sample_count: sorted.len(),
            buckets,
        }
    }

    /// Point-in-time snapshot for the `/metrics` surface and periodic log.
    pub fn summary(&self) -> MetricsSummary {
        let inner = self.inner.lock();
        MetricsSummary {
            requests_total: inner.requests_total,
            requests_by_method: inner.requests_by_method.clone(),
            requests_by_endpoint: inner.requests_by_endpoint.clone(),
            requests_by_status_class: inner.requests_by_status_class.clone(),
            errors_total: inner.errors_total,
            errors_by_code: inner.errors_by_code.clone(),
            errors_by_endpoint: inner.errors_by_endpoint.clone(),
            recent_errors: inner.error_ring.iter().cloned().collect(),
            rate_limit_exceeded: inner.rate_limit_exceeded.clone(),
            cache_hits: inner.cache_hits.clone(),
            cache_misses: inner.cache_misses.clone(),
            external_calls: inner.external_calls.clone(),
            response_times: Self::histogram(&inner.response_times),
        }
    }

    /// Emits the current summary as a single structured log line. Intended
    /// to be called on a slow periodic tick (spec §4.I "periodic summary
    /// log optional"); never called internally by this crate.
    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            requests_total = summary.requests_total,
            errors_total = summary.errors_total,
            p50 = summary.response_times.p50,
            p95 = summary.response_times.p95,
            p99 = summary.response_times.p99,
            "metrics summary"
        );
    }
}

/// Percentile by sort-and-index (spec §4.I). `sorted` must already be
/// ascending. Returns 0.0 on an empty window.
fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx] as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_counters_split_by_method_endpoint_and_status_class() {
        let metrics = MetricsCollector::new();
        metrics.record_request("USER_MESSAGE", "/ws", 200);
        metrics.record_request("USER_MESSAGE", "/ws", 500);
        metrics.record_request("GET", "/health", 200);

        let summary = metrics.summary();
        assert_eq!(summary.requests_total, 3);
        assert_eq!(summary.requests_by_method["USER_MESSAGE"], 2);
        assert_eq!(summary.requests_by_endpoint["/ws"], 2);
        assert_eq!(summary.requests_by_status_class.success, 2);
        assert_eq!(summary.requests_by_status_class.server_error, 1);
    }

    #[test]
    fn error_ring_buffer_caps_at_100_and_drops_oldest() {
        let metrics = MetricsCollector::new();
        for i in 0..150 {
            metrics.record_error("TOOL_ERROR", "/ws", &format!("boom {i}"), i as i64);
        }
        let summary = metrics.summary();
        assert_eq!(summary.errors_total, 150);
        assert_eq!(summary.recent_errors.len(), 100);
        assert_eq!(summary.recent_errors.first().unwrap().message, "boom 50");
        assert_eq!(summary.recent_errors.last().unwrap().message, "boom 149");
    }

    #[test]
    fn percentiles_are_computed_by_sort_and_index() {
        let metrics = MetricsCollector::new();
        for ms in 1..=100u64 {
            metrics.record_response_time(ms);
        }
        let summary = metrics.summary();
        assert_eq!(summary.response_times.p50, 50.0);
        assert_eq!(summary.response_times.p99, 99.0);
    }

    #[test]
    fn response_time_window_is_bounded_to_last_1000_samples() {
        let metrics = MetricsCollector::new();
        for ms in 0..1_500u64 {
            metrics.record_response_time(ms);
        }
        let summary = metrics.summary();
        assert_eq!(summary.response_times.sample_count, 1_000);
    }

    #[test]
    fn cache_hit_and_miss_counters_are_namespaced() {
        let metrics = MetricsCollector::new();
        metrics.record_cache_hit("gas-prices");
        metrics.record_cache_hit("gas-prices");
        metrics.record_cache_miss("gas-prices");
        metrics.record_cache_miss("token-balances");

        let summary = metrics.summary();
        assert_eq!(summary.cache_hits["gas-prices"], 2);
        assert_eq!(summary.cache_misses["gas-prices"], 1);
        assert_eq!(summary.cache_misses["token-balances"], 1);
    }

    #[test]
    fn external_call_stats_track_failures_and_average_latency() {
        let metrics = MetricsCollector::new();
        metrics.record_external_call("llm-openai", true, 100);
        metrics.record_external_call("llm-openai", false, 300);

        let summary = metrics.summary();
        let stats = &summary.external_calls["llm-openai"];
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.average_response_time_ms(), 200.0);
    }
}
