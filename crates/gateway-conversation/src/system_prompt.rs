use gateway_llm::ToolDescriptor;

/// Builds a tool-aware system prompt (spec §4.F step 5, §6). Kept deliberately
/// small: one line of framing plus a bullet per available tool.
pub fn build_system_prompt(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "You are a helpful assistant for decentralized-finance questions.".to_string();
    }
    let mut prompt =
        "You are a helpful assistant for decentralized-finance questions. You may call the following tools when they would help answer the user:\n".to_string();
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_tool_by_name() {
        let tools = vec![ToolDescriptor {
            name: "get_gas_prices".to_string(),
            description: "Fetches current gas prices".to_string(),
            parameters_schema: serde_json::json!({}),
        }];
        let prompt = build_system_prompt(&tools);
        assert!(prompt.contains("get_gas_prices"));
    }

    #[test]
    fn falls_back_to_plain_prompt_with_no_tools() {
        let prompt = build_system_prompt(&[]);
        assert!(!prompt.is_empty());
    }
}
