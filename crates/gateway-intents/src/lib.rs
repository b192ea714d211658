//! Component-intent generator (spec §4.E): maps tool results and response
//! text to UI-render instructions, three layers combined with
//! de-duplication on `(type, component)`.

use gateway_core::{ToolResult, UiIntent};
use serde_json::{json, Value};

/// Tool-name -> component mapping, applied first (spec §4.E layer 1).
fn component_for_tool(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "get_gas_prices" => Some("NetworkStatus"),
        "get_crypto_price" => Some("TokenSwap"),
        "get_lending_rates" => Some("LendingSection"),
        "get_token_balance" => Some("YourAssets"),
        _ => None,
    }
}

/// Reaches into a tool result's known field paths, falling back to an
/// empty object so a missing field never panics the intent layer.
fn props_for_tool_result(tool_name: &str, result: &Value) -> Value {
    match tool_name {
        "get_gas_prices" => json!({
            "network": result.get("network").cloned().unwrap_or(Value::Null),
            "gasPrices": result.get("gasPrices").cloned().unwrap_or(Value::Null),
        }),
        "get_crypto_price" => json!({
            "symbol": result.get("symbol").cloned().unwrap_or(Value::Null),
            "price": result.get("price").cloned().unwrap_or(Value::Null),
        }),
        "get_lending_rates" => json!({
            "token": result.get("token").cloned().unwrap_or(Value::Null),
            "rates": result.get("rates").cloned().unwrap_or(Value::Null),
        }),
        "get_token_balance" => json!({
            "address": result.get("address").cloned().unwrap_or(Value::Null),
            "balances": result.get("balances").cloned().unwrap_or(Value::Null),
        }),
        _ => json!({}),
    }
}

struct KeywordRule {
    keywords: &'static [&'static str],
    component: &'static str,
}

const TEXT_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["gas", "fee"],
        component: "NetworkStatus",
    },
    KeywordRule {
        keywords: &["swap", "trade"],
        component: "TokenSwap",
    },
    KeywordRule {
        keywords: &["lend", "apy", "yield"],
        component: "LendingSection",
    },
    KeywordRule {
        keywords: &["balance", "asset", "portfolio", "wallet"],
        component: "YourAssets",
    },
];

fn matches_any_keyword(haystack_lower: &str, rule: &KeywordRule) -> bool {
    rule.keywords.iter().any(|kw| haystack_lower.contains(kw))
}

/// Generates UI intents from (tool results, user text, final LLM text)
/// (spec §4.F step 8, §4.E). Stable insertion order; de-duplicated on
/// `(type, component)`, first occurrence wins.
pub fn generate_ui_intents(tool_results: &[ToolResult], user_text: &str, llm_text: &str) -> Vec<UiIntent> {
    let mut intents: Vec<UiIntent> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    // Layer 1: tool-result-driven.
    for result in tool_results {
        if !result.success {
            continue;
        }
        if let Some(component) = component_for_tool(&result.tool_name) {
            push_unique(
                &mut intents,
                &mut seen,
                UiIntent::render(component, props_for_tool_result(&result.tool_name, &result.result)),
            );
        }
    }

    // Layer 2: response-text-driven, case-insensitive, over both user and
    // final LLM text.
    let combined_lower = format!("{} {}", user_text.to_lowercase(), llm_text.to_lowercase());
    for rule in TEXT_RULES {
        if matches_any_keyword(&combined_lower, rule) {
            push_unique(&mut intents, &mut seen, UiIntent::render(rule.component, json!({})));
        }
    }

    // Layer 3: pattern fallback on the user message only, used only if the
    // two layers above produced nothing at all.
    if intents.is_empty() {
        let user_lower = user_text.to_lowercase();
        if let Some(rule) = TEXT_RULES.iter().find(|r| matches_any_keyword(&user_lower, r)) {
            push_unique(&mut intents, &mut seen, UiIntent::render(rule.component, json!({})));
        }
    }

    intents
}

fn push_unique(
    intents: &mut Vec<UiIntent>,
    seen: &mut std::collections::HashSet<(String, String)>,
    intent: UiIntent,
) {
    let key = (intent.kind.clone(), intent.component.clone());
    if seen.insert(key) {
        intents.push(intent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::ErrorDescriptor;

    fn tool_result(name: &str, success: bool, result: Value) -> ToolResult {
        ToolResult {
            tool_name: name.to_string(),
            arguments: json!({}),
            result,
            execution_time_ms: 1,
            success,
            error: if success {
                None
            } else {
                Some(ErrorDescriptor {
                    code: gateway_core::ErrorCode::ToolError,
                    message: "x".into(),
                    retryable: false,
                    suggestions: vec![],
                })
            },
            from_cache: None,
            data_freshness: None,
        }
    }

    #[test]
    fn gas_tool_result_yields_network_status_intent() {
        let results = vec![tool_result(
            "get_gas_prices",
            true,
            json!({"network": "ethereum", "gasPrices": {"standard": {"gwei": 15}}}),
        )];
        let intents = generate_ui_intents(&results, "What's the gas on Ethereum?", "Ethereum gas is ~15 gwei.");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].component, "NetworkStatus");
    }

    #[test]
    fn failed_tool_results_do_not_drive_intents() {
        let results = vec![tool_result("get_gas_prices", false, Value::Null)];
        let intents = generate_ui_intents(&results, "gas please", "sorry, failed");
        assert!(intents.is_empty());
    }

    #[test]
    fn text_layer_deduplicates_with_tool_layer() {
        let results = vec![tool_result(
            "get_gas_prices",
            true,
            json!({"network": "ethereum"}),
        )];
        let intents = generate_ui_intents(&results, "what about gas fees", "gas is high");
        assert_eq!(intents.len(), 1);
    }

    #[test]
    fn pattern_fallback_only_fires_when_other_layers_are_empty() {
        let intents = generate_ui_intents(&[], "show me my wallet balance", "here you go");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].component, "YourAssets");
    }

    #[test]
    fn no_keywords_anywhere_yields_no_intents() {
        let intents = generate_ui_intents(&[], "hello there", "hi, how can I help?");
        assert!(intents.is_empty());
    }

    #[test]
    fn multiple_distinct_components_preserve_first_seen_order() {
        let intents = generate_ui_intents(&[], "I want to swap and also check lending apy", "ok");
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].component, "TokenSwap");
        assert_eq!(intents[1].component, "LendingSection");
    }
}
