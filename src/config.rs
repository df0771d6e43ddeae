//! Process-wide configuration.
//!
//! Loaded once at startup from environment variables (via `.env`), with
//! an optional TOML overlay for the nested per-chain tables that don't
//! fit comfortably into env vars: flat scalars from the environment,
//! structured tables from TOML.

use crate::chain::SpecificChain;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Process-wide, immutable-after-boot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered specific EVM chains the aggregator tries when a token has
    /// no chain memo hit.
    pub evm_chains: Vec<SpecificChain>,

    /// `specific_chain -> symbol -> amount` seeded on team registration.
    pub initial_balances: HashMap<SpecificChain, HashMap<String, Decimal>>,

    /// `specific_chain -> symbol -> token address`. Used to seed balances
    /// and to classify a known token's specific chain without a network call.
    pub specific_chain_tokens: HashMap<SpecificChain, HashMap<String, String>>,

    pub price_cache_ttl: Duration,
    pub chain_memo_ttl: Duration,

    pub snapshot_interval: Duration,
    pub price_freshness: Duration,

    pub allow_cross_chain_trading: bool,
    pub max_portfolio_fraction: Decimal,
    pub min_trade_from_amount: Decimal,

    /// Per-provider API keys. A provider whose key is absent here is
    /// excluded from the aggregator's provider list at boot.
    pub provider_api_keys: ProviderApiKeys,

    pub dexscreener_base_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderApiKeys {
    pub dexscreener: Option<String>,
    pub multichain_evm: Option<String>,
}

/// Nested per-chain tables that are awkward to express as flat env vars.
/// Optional: a deployment with no interesting per-chain token map can
/// omit this file entirely and rely on defaults.
#[derive(Debug, Deserialize)]
struct ChainTables {
    #[serde(default)]
    initial_balances: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    specific_chain_tokens: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Load configuration from the environment (`.env` is read if present)
    /// and, if `chain_tables_path` exists, overlay the per-chain TOML
    /// tables it declares.
    pub fn load(chain_tables_path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let price_cache_ttl_secs: u64 = env_or_default("PRICE_CACHE_TTL_SECS", 30)?;
        let chain_memo_ttl_secs: u64 = env_or_default("CHAIN_MEMO_TTL_SECS", 3600)?;
        let snapshot_interval_ms: u64 = env_or_default("SNAPSHOT_INTERVAL_MS", 120_000)?;
        let price_freshness_ms: u64 = env_or_default("PRICE_FRESHNESS_MS", 600_000)?;
        let allow_cross_chain_trading: bool = env_or_default("ALLOW_CROSS_CHAIN_TRADING", false)?;
        let max_portfolio_fraction: String =
            env_or_default_string("MAX_PORTFOLIO_FRACTION", "0.25")?;
        let min_trade_from_amount: String =
            env_or_default_string("MIN_TRADE_FROM_AMOUNT", "0.000001")?;
        let dexscreener_base_url =
            env_or_default_string("DEXSCREENER_BASE_URL", "https://api.dexscreener.com/latest/dex/tokens")?;

        let (initial_balances, specific_chain_tokens) = load_chain_tables(chain_tables_path)?;

        Ok(Self {
            evm_chains: SpecificChain::DEFAULT_EVM_ORDER.to_vec(),
            initial_balances,
            specific_chain_tokens,
            price_cache_ttl: Duration::from_secs(price_cache_ttl_secs),
            chain_memo_ttl: Duration::from_secs(chain_memo_ttl_secs),
            snapshot_interval: Duration::from_millis(snapshot_interval_ms),
            price_freshness: Duration::from_millis(price_freshness_ms),
            allow_cross_chain_trading,
            max_portfolio_fraction: max_portfolio_fraction
                .parse()
                .context("MAX_PORTFOLIO_FRACTION must be a decimal")?,
            min_trade_from_amount: min_trade_from_amount
                .parse()
                .context("MIN_TRADE_FROM_AMOUNT must be a decimal")?,
            provider_api_keys: ProviderApiKeys {
                dexscreener: std::env::var("DEXSCREENER_API_KEY").ok(),
                multichain_evm: std::env::var("MULTICHAIN_EVM_API_KEY").ok(),
            },
            dexscreener_base_url,
        })
    }

    /// A config with sane defaults and no per-chain tables, for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let mut initial_balances = HashMap::new();
        let mut base = HashMap::new();
        base.insert("USDC".to_string(), Decimal::new(5000, 0));
        initial_balances.insert(SpecificChain::Base, base);

        let mut specific_chain_tokens = HashMap::new();
        let mut base_tokens = HashMap::new();
        base_tokens.insert(
            "USDC".to_string(),
            "0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA".to_string(),
        );
        specific_chain_tokens.insert(SpecificChain::Base, base_tokens);

        Self {
            evm_chains: SpecificChain::DEFAULT_EVM_ORDER.to_vec(),
            initial_balances,
            specific_chain_tokens,
            price_cache_ttl: Duration::from_secs(30),
            chain_memo_ttl: Duration::from_secs(3600),
            snapshot_interval: Duration::from_millis(120_000),
            price_freshness: Duration::from_millis(600_000),
            allow_cross_chain_trading: false,
            max_portfolio_fraction: "0.25".parse().unwrap(),
            min_trade_from_amount: "0.000001".parse().unwrap(),
            provider_api_keys: ProviderApiKeys::default(),
            dexscreener_base_url: "https://api.dexscreener.com/latest/dex/tokens".to_string(),
        }
    }
}

fn load_chain_tables(
    path: impl AsRef<Path>,
) -> Result<(
    HashMap<SpecificChain, HashMap<String, Decimal>>,
    HashMap<SpecificChain, HashMap<String, String>>,
)> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok((HashMap::new(), HashMap::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read chain tables: {}", path.display()))?;
    let tables: ChainTables =
        toml::from_str(&content).with_context(|| "failed to parse chain tables TOML")?;

    let mut initial_balances = HashMap::new();
    for (chain_str, symbols) in tables.initial_balances {
        let Some(chain) = SpecificChain::from_str_opt(&chain_str) else {
            continue;
        };
        let mut parsed = HashMap::new();
        for (symbol, amount_str) in symbols {
            let amount: Decimal = amount_str
                .parse()
                .with_context(|| format!("bad initial balance for {chain_str}/{symbol}"))?;
            parsed.insert(symbol, amount);
        }
        initial_balances.insert(chain, parsed);
    }

    let mut specific_chain_tokens = HashMap::new();
    for (chain_str, symbols) in tables.specific_chain_tokens {
        let Some(chain) = SpecificChain::from_str_opt(&chain_str) else {
            continue;
        };
        specific_chain_tokens.insert(chain, symbols);
    }

    Ok((initial_balances, specific_chain_tokens))
}

fn env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_or_default_string(key: &str, default: &str) -> Result<String> {
    Ok(std::env::var(key).unwrap_or_else(|_| default.to_string()))
}
