//! Normative schemas for the four default tools (spec §4.C, §6). The enum
//! sets and regex pattern here are part of the external wire contract and
//! must not drift from spec.md §6.

use crate::schema::{ParamSpec, ParamType, ToolSchema};

pub const NETWORKS: &[&str] = &["ethereum", "polygon", "bsc", "arbitrum", "optimism"];
pub const TRANSACTION_TYPES: &[&str] = &["transfer", "swap", "contract_interaction"];
pub const FIAT_CURRENCIES: &[&str] = &["USD", "EUR", "GBP"];
pub const CRYPTO_SYMBOLS: &[&str] = &["BTC", "ETH", "USDC", "USDT", "SOL", "MATIC", "LINK", "UNI"];
pub const LENDING_TOKENS: &[&str] = &[
    "ETH", "DAI", "USDC", "USDT", "WBTC", "UNI", "LINK", "AAVE", "COMP",
];
pub const LENDING_PROTOCOLS: &[&str] = &["aave", "compound"];
pub const ADDRESS_PATTERN: &str = r"^0x[a-fA-F0-9]{40}$";

pub fn get_gas_prices_schema() -> ToolSchema {
    ToolSchema::new(vec![
        ParamSpec::required("network", ParamType::String).with_enum(NETWORKS),
        ParamSpec::optional("transactionType", ParamType::String).with_enum(TRANSACTION_TYPES),
        ParamSpec::optional("includeUSDCosts", ParamType::Boolean),
    ])
}

pub fn get_crypto_price_schema() -> ToolSchema {
    ToolSchema::new(vec![
        ParamSpec::required("symbol", ParamType::String).with_enum(CRYPTO_SYMBOLS),
        ParamSpec::optional("currency", ParamType::String).with_enum(FIAT_CURRENCIES),
        ParamSpec::optional("includeMarketData", ParamType::Boolean),
    ])
}

pub fn get_lending_rates_schema() -> ToolSchema {
    ToolSchema::new(vec![
        ParamSpec::required("token", ParamType::String).with_enum(LENDING_TOKENS),
        ParamSpec::optional("protocols", ParamType::Array).with_item_enum(LENDING_PROTOCOLS),
        ParamSpec::optional("includeUtilization", ParamType::Boolean),
    ])
}

pub fn get_token_balance_schema() -> ToolSchema {
    ToolSchema::new(vec![
        ParamSpec::required("address", ParamType::String).with_pattern(ADDRESS_PATTERN),
        ParamSpec::required("network", ParamType::String).with_enum(NETWORKS),
        ParamSpec::optional("tokenAddress", ParamType::String).with_pattern(ADDRESS_PATTERN),
        ParamSpec::optional("includeUSDValues", ParamType::Boolean),
    ])
}
