//! DexScreener-backed price source.
//!
//! Works for both chain families: `GET {base}/{chainId}/{tokenAddress}`
//! returns an array of pools, and this provider scans for the first one
//! with a parseable positive USD price. Requires a specific chain to
//! build the URL, so unlike `MultiChainEvmProvider` it never guesses —
//! it's the pinned-chain complement to that provider's discovery loop.

use super::{retry_with_backoff, PriceProvider, PriceQuote, ProviderCache, RequestGate, UpstreamFailure};
use crate::chain::{Chain, SpecificChain};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

pub struct DexScreenerProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    gate: RequestGate,
    cache: ProviderCache,
}

impl DexScreenerProvider {
    pub fn new(base_url: String, api_key: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            gate: RequestGate::standard(),
            cache: ProviderCache::new(cache_ttl),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DexScreenerPool {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
}

/// Translates a specific chain into the upstream's chain identifier, the
/// inverse of `dexscreener_chain_id_to_specific` (used when we'd otherwise
/// want to interpret a response's own chain tag rather than assume ours).
fn specific_chain_to_dexscreener_id(chain: SpecificChain) -> &'static str {
    match chain {
        SpecificChain::Eth => "ethereum",
        SpecificChain::Polygon => "polygon",
        SpecificChain::Bsc => "bsc",
        SpecificChain::Arbitrum => "arbitrum",
        SpecificChain::Optimism => "optimism",
        SpecificChain::Avalanche => "avalanche",
        SpecificChain::Base => "base",
        SpecificChain::Linea => "linea",
        SpecificChain::Zksync => "zksync",
        SpecificChain::Scroll => "scroll",
        SpecificChain::Mantle => "mantle",
        SpecificChain::Svm => "solana",
    }
}

#[allow(dead_code)]
fn dexscreener_chain_id_to_specific(chain_id: &str) -> Option<SpecificChain> {
    match chain_id {
        "ethereum" => Some(SpecificChain::Eth),
        "polygon" => Some(SpecificChain::Polygon),
        "bsc" => Some(SpecificChain::Bsc),
        "arbitrum" => Some(SpecificChain::Arbitrum),
        "optimism" => Some(SpecificChain::Optimism),
        "avalanche" => Some(SpecificChain::Avalanche),
        "base" => Some(SpecificChain::Base),
        "linea" => Some(SpecificChain::Linea),
        "zksync" => Some(SpecificChain::Zksync),
        "scroll" => Some(SpecificChain::Scroll),
        "mantle" => Some(SpecificChain::Mantle),
        "solana" => Some(SpecificChain::Svm),
        _ => None,
    }
}

#[async_trait]
impl PriceProvider for DexScreenerProvider {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn get_price(
        &self,
        token_address: &str,
        _chain: Chain,
        specific_chain: Option<SpecificChain>,
    ) -> Option<PriceQuote> {
        // DexScreener requires the caller (or the aggregator) to supply
        // the specific chain so it can be translated into the upstream's
        // chain identifier; without one there's nothing to ask for.
        let specific_chain = specific_chain?;

        if let Some(quote) = self.cache.get(specific_chain, token_address) {
            return Some(quote);
        }

        let chain_id = specific_chain_to_dexscreener_id(specific_chain);
        let quote = retry_with_backoff(self.name(), || async {
            self.gate.wait().await;
            let mut req = self
                .client
                .get(format!("{}/{}/{}", self.base_url, chain_id, token_address));
            if let Some(key) = &self.api_key {
                req = req.header("x-api-key", key);
            }
            let resp = req.send().await.map_err(|_| UpstreamFailure::Transient)?;

            if resp.status().is_client_error() {
                return Ok(None);
            }
            if resp.status().is_server_error() {
                return Err(UpstreamFailure::Transient);
            }

            let pools: Vec<DexScreenerPool> = resp
                .json()
                .await
                .map_err(|_| UpstreamFailure::Transient)?;

            let matching = pools.into_iter().find_map(|pool| {
                let price: Decimal = pool.price_usd?.parse().ok()?;
                if price <= Decimal::ZERO {
                    return None;
                }
                Some(PriceQuote {
                    price_usd: price,
                    chain: specific_chain.general_chain(),
                    specific_chain,
                })
            });

            Ok(matching)
        })
        .await?;

        self.cache.put(quote.specific_chain, token_address, quote);
        Some(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_chain_ids_are_ignored() {
        assert_eq!(dexscreener_chain_id_to_specific("nonsense"), None);
        assert_eq!(
            dexscreener_chain_id_to_specific("base"),
            Some(SpecificChain::Base)
        );
    }

    #[test]
    fn specific_chain_translates_to_upstream_id() {
        assert_eq!(specific_chain_to_dexscreener_id(SpecificChain::Eth), "ethereum");
        assert_eq!(specific_chain_to_dexscreener_id(SpecificChain::Svm), "solana");
    }
}
