use gateway_core::IntentHint;

struct IntentRule {
    keywords: &'static [&'static str],
    primary: &'static str,
    suggested_tools: &'static [&'static str],
    confidence: f32,
}

const RULES: &[IntentRule] = &[
    IntentRule {
        keywords: &["gas", "fee"],
        primary: "network_status",
        suggested_tools: &["get_gas_prices"],
        confidence: 0.7,
    },
    IntentRule {
        keywords: &["swap", "trade", "price"],
        primary: "token_swap",
        suggested_tools: &["get_crypto_price"],
        confidence: 0.6,
    },
    IntentRule {
        keywords: &["lend", "apy", "yield"],
        primary: "lending",
        suggested_tools: &["get_lending_rates"],
        confidence: 0.6,
    },
    IntentRule {
        keywords: &["balance", "wallet", "portfolio", "asset"],
        primary: "assets",
        suggested_tools: &["get_token_balance"],
        confidence: 0.6,
    },
];

/// Advisory keyword classifier (spec §4.F step 4). Does not gate which
/// tools the LLM may call.
pub fn classify_intent(user_text: &str) -> IntentHint {
    let lower = user_text.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|kw| lower.contains(kw)) {
            return IntentHint {
                primary: rule.primary.to_string(),
                confidence: rule.confidence,
                suggested_tools: rule.suggested_tools.iter().map(|s| s.to_string()).collect(),
            };
        }
    }
    IntentHint {
        primary: "general".to_string(),
        confidence: 0.3,
        suggested_tools: vec![],
    }
}
