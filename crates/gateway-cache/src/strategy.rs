use std::time::Duration;

use serde_json::Value;

/// Named TTL strategy applied at set/get time (spec §4.B strategy layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Lru,
    TimeBased,
    FrequencyBased,
    UserBased,
    Conditional,
}

/// User tier used by the `user_based` strategy to scale TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTier {
    Free,
    Plus,
    Pro,
}

impl UserTier {
    fn ttl_multiplier(self) -> f64 {
        match self {
            UserTier::Free => 0.5,
            UserTier::Plus => 1.0,
            UserTier::Pro => 2.0,
        }
    }
}

/// Ambient context a strategy may need to decide a TTL or refuse a write.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    pub market_hours: bool,
    pub volatile: bool,
    pub access_count: u64,
    pub user_tier: Option<UserTier>,
    /// Caps balance-like namespaces at 30s under `user_based` (spec §4.B).
    pub is_balance_like: bool,
}

/// Applies `strategy` to decide the effective TTL for a write, or `None` to
/// refuse caching the value entirely (the `conditional` strategy's escape
/// hatch for empty/null values).
pub fn effective_ttl(
    strategy: Strategy,
    default_ttl: Duration,
    value: &Value,
    ctx: &StrategyContext,
) -> Option<Duration> {
    match strategy {
        Strategy::Lru => Some(default_ttl),
        Strategy::TimeBased => {
            if ctx.market_hours || ctx.volatile {
                Some(default_ttl / 2)
            } else {
                Some(default_ttl)
            }
        }
        Strategy::FrequencyBased => {
            if ctx.access_count > 10 {
                Some(default_ttl * 2)
            } else if ctx.access_count == 0 {
                Some(default_ttl / 2)
            } else {
                Some(default_ttl)
            }
        }
        Strategy::UserBased => {
            let mult = ctx.user_tier.map(UserTier::ttl_multiplier).unwrap_or(1.0);
            let scaled = default_ttl.mul_f64(mult);
            if ctx.is_balance_like {
                Some(scaled.min(Duration::from_secs(30)))
            } else {
                Some(scaled)
            }
        }
        Strategy::Conditional => {
            if is_empty_value(value) {
                None
            } else {
                Some(default_ttl)
            }
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_refuses_empty_values() {
        let ttl = effective_ttl(
            Strategy::Conditional,
            Duration::from_secs(60),
            &Value::Null,
            &StrategyContext::default(),
        );
        assert!(ttl.is_none());
        let ttl = effective_ttl(
            Strategy::Conditional,
            Duration::from_secs(60),
            &serde_json::json!({"a": 1}),
            &StrategyContext::default(),
        );
        assert_eq!(ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn frequency_based_doubles_for_hot_keys_halves_for_cold() {
        let hot = effective_ttl(
            Strategy::FrequencyBased,
            Duration::from_secs(60),
            &Value::Null,
            &StrategyContext {
                access_count: 11,
                ..Default::default()
            },
        );
        assert_eq!(hot, Some(Duration::from_secs(120)));
        let cold = effective_ttl(
            Strategy::FrequencyBased,
            Duration::from_secs(60),
            &Value::Null,
            &StrategyContext::default(),
        );
        assert_eq!(cold, Some(Duration::from_secs(30)));
    }

    #[test]
    fn user_based_caps_balance_like_namespaces_at_30s() {
        let ttl = effective_ttl(
            Strategy::UserBased,
            Duration::from_secs(60),
            &Value::Null,
            &StrategyContext {
                user_tier: Some(UserTier::Pro),
                is_balance_like: true,
                ..Default::default()
            },
        );
        assert_eq!(ttl, Some(Duration::from_secs(30)));
    }
}
