//! Shared rate limiter (spec §4.A): per-key token accounting with burst
//! allowance, plus coordinated per-provider caps.
//!
//! Keys never explicitly configured are always allowed (implementation
//! freedom called out in spec §4.A edge cases) — this limiter only gates
//! traffic the caller opted into naming.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

/// Priority is carried on the key config for the cache manager's global
/// eviction ordering (spec §4.B) to reuse; the limiter itself does not use
/// it to change admission decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone)]
pub struct RateLimitKeyConfig {
    pub name: String,
    pub max_requests: u32,
    pub window: Duration,
    pub burst_fraction: f64,
    pub provider: Option<String>,
    pub priority: Priority,
}

impl RateLimitKeyConfig {
    pub fn new(name: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
            burst_fraction: 0.0,
            provider: None,
            priority: Priority::Normal,
        }
    }

    pub fn with_burst(mut self, burst_fraction: f64) -> Self {
        self.burst_fraction = burst_fraction;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// `floor(max_requests * (1 + burst_fraction))`; with `burst_fraction ==
    /// 0.0` this equals `max_requests` exactly, so burst=0 behaves as a hard
    /// cap with no off-by-one (spec §4.A edge cases, §8 P3/P4).
    fn burst_cap(&self) -> u32 {
        ((self.max_requests as f64) * (1.0 + self.burst_fraction)).floor() as u32
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RateLimitExceeded,
    ProviderLimitExceeded,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::RateLimitExceeded => "rate_limit_exceeded",
            DenyReason::ProviderLimitExceeded => "provider_limit_exceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { burst: bool },
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("timed out waiting for rate limit on key \"{0}\"")]
    WaitTimeout(String),
}

#[derive(Default)]
struct State {
    keys: HashMap<String, RateLimitKeyConfig>,
    providers: HashMap<String, ProviderConfig>,
    history: HashMap<String, VecDeque<Instant>>,
    provider_history: HashMap<String, VecDeque<Instant>>,
    burst_counts: HashMap<String, u64>,
}

/// Coordinates outbound traffic per key and per upstream provider (spec
/// §4.A). Cheap to clone (wraps an `Arc`-free `Mutex` behind `&self`, so
/// share it behind an `Arc<RateLimiter>`).
pub struct RateLimiter {
    state: Mutex<State>,
    poll_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl RateLimiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            poll_interval,
        }
    }

    pub async fn configure_key(&self, config: RateLimitKeyConfig) {
        let mut state = self.state.lock().await;
        state.keys.insert(config.name.clone(), config);
    }

    pub async fn configure_provider(&self, name: impl Into<String>, config: ProviderConfig) {
        let mut state = self.state.lock().await;
        state.providers.insert(name.into(), config);
    }

    /// Point-in-time admission check for `key` at `now` (spec §4.A). Appends
    /// to history on allow; never mutates state on deny.
    pub async fn check(&self, key: &str, now: Instant) -> Decision {
        let mut state = self.state.lock().await;
        let Some(config) = state.keys.get(key).cloned() else {
            // Never-configured keys are always allowed.
            return Decision::Allowed { burst: false };
        };

        let window_count = {
            let hist = state.history.entry(key.to_string()).or_default();
            prune(hist, now, config.window);
            hist.len() as u32
        };

        let burst = if window_count + 1 <= config.max_requests {
            false
        } else if config.burst_fraction > 0.0 && window_count + 1 <= config.burst_cap() {
            true
        } else {
            return Decision::Denied(DenyReason::RateLimitExceeded);
        };

        if let Some(provider_name) = &config.provider {
            if let Some(provider_cfg) = state.providers.get(provider_name).cloned() {
                let phist = state
                    .provider_history
                    .entry(provider_name.clone())
                    .or_default();
                prune(phist, now, provider_cfg.window);
                if phist.len() as u32 >= provider_cfg.max_requests {
                    return Decision::Denied(DenyReason::ProviderLimitExceeded);
                }
            }
        }

        state.history.entry(key.to_string()).or_default().push_back(now);
        if let Some(provider_name) = &config.provider {
            state
                .provider_history
                .entry(provider_name.clone())
                .or_default()
                .push_back(now);
        }
        if burst {
            *state.burst_counts.entry(key.to_string()).or_insert(0) += 1;
        }
        Decision::Allowed { burst }
    }

    /// Polls [`check`] until allowed or `max_wait` elapses, sleeping between
    /// polls for `min(poll_interval, time_until_reset)` (spec §4.A).
    pub async fn wait_for(&self, key: &str, max_wait: Duration) -> Result<(), RateLimitError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let now = Instant::now();
            if self.check(key, now).await.is_allowed() {
                return Ok(());
            }
            if now >= deadline {
                return Err(RateLimitError::WaitTimeout(key.to_string()));
            }
            let time_until_reset = self.time_until_reset(key, now).await;
            let remaining = deadline.saturating_duration_since(now);
            let sleep_for = self.poll_interval.min(time_until_reset).min(remaining);
            sleep(sleep_for).await;
        }
    }

    async fn time_until_reset(&self, key: &str, now: Instant) -> Duration {
        let state = self.state.lock().await;
        let Some(config) = state.keys.get(key) else {
            return self.poll_interval;
        };
        match state.history.get(key).and_then(|h| h.front()) {
            Some(oldest) => {
                let elapsed = now.saturating_duration_since(*oldest);
                config.window.saturating_sub(elapsed)
            }
            None => self.poll_interval,
        }
    }

    /// Drops history entries older than `max_age` (default 1h) across all
    /// keys and providers, bounding memory (spec §4.A cleanup).
    pub async fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        for hist in state.history.values_mut() {
            prune(hist, now, max_age);
        }
        for hist in state.provider_history.values_mut() {
            prune(hist, now, max_age);
        }
    }

    pub async fn burst_count(&self, key: &str) -> u64 {
        let state = self.state.lock().await;
        state.burst_counts.get(key).copied().unwrap_or(0)
    }
}

fn prune(hist: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = hist.front() {
        if now.saturating_duration_since(*front) >= window {
            hist.pop_front();
        } else {
            break;
        }
    }
}

pub const DEFAULT_CLEANUP_MAX_AGE: Duration = Duration::from_secs(3600);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hard_cap_with_zero_burst_denies_on_overflow() {
        let limiter = RateLimiter::default();
        limiter
            .configure_key(RateLimitKeyConfig::new("k", 3, Duration::from_millis(1000)))
            .await;
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check("k", now).await.is_allowed());
        }
        assert_eq!(
            limiter.check("k", now).await,
            Decision::Denied(DenyReason::RateLimitExceeded)
        );
    }

    #[tokio::test]
    async fn burst_allows_extra_then_denies() {
        let limiter = RateLimiter::default();
        limiter
            .configure_key(
                RateLimitKeyConfig::new("k", 5, Duration::from_millis(1000)).with_burst(0.4),
            )
            .await;
        let now = Instant::now();
        let mut allowed = 0;
        for _ in 0..8 {
            if limiter.check("k", now).await.is_allowed() {
                allowed += 1;
            }
        }
        // 5 base + floor(5*1.4)-5 = 7 total -> 7 allowed, 1 denied out of 8.
        assert_eq!(allowed, 7);
    }

    #[tokio::test]
    async fn unconfigured_keys_are_always_allowed() {
        let limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..50 {
            assert!(limiter.check("unknown", now).await.is_allowed());
        }
    }

    #[tokio::test]
    async fn provider_cap_denies_even_when_key_has_room() {
        let limiter = RateLimiter::default();
        limiter
            .configure_key(
                RateLimitKeyConfig::new("k1", 10, Duration::from_millis(1000))
                    .with_provider("llm"),
            )
            .await;
        limiter
            .configure_key(
                RateLimitKeyConfig::new("k2", 10, Duration::from_millis(1000))
                    .with_provider("llm"),
            )
            .await;
        limiter
            .configure_provider(
                "llm",
                ProviderConfig {
                    max_requests: 1,
                    window: Duration::from_millis(1000),
                },
            )
            .await;
        let now = Instant::now();
        assert!(limiter.check("k1", now).await.is_allowed());
        assert_eq!(
            limiter.check("k2", now).await,
            Decision::Denied(DenyReason::ProviderLimitExceeded)
        );
    }

    #[tokio::test]
    async fn wait_for_times_out_when_never_allowed() {
        let limiter = RateLimiter::new(Duration::from_millis(5));
        limiter
            .configure_key(RateLimitKeyConfig::new("k", 1, Duration::from_secs(10)))
            .await;
        let now = Instant::now();
        assert!(limiter.check("k", now).await.is_allowed());
        let err = limiter
            .wait_for("k", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::WaitTimeout(_)));
    }
}
