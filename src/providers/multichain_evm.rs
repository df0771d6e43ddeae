//! EVM price source that probes a configurable ordered list of chains.
//!
//! An EVM token address alone doesn't say which chain it deployed to.
//! When the aggregator has no chain memo hit it asks this provider with
//! `specific_chain = None`, and this provider tries each configured
//! chain in turn, same shape as the engine's executor fan-out, just
//! sequential instead of concurrent because each hop consumes the same
//! upstream's rate budget.

use super::{retry_with_backoff, PriceProvider, PriceQuote, ProviderCache, RequestGate, UpstreamFailure};
use crate::chain::{Chain, SpecificChain};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

pub struct MultiChainEvmProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_order: Vec<SpecificChain>,
    gate: RequestGate,
    cache: ProviderCache,
}

impl MultiChainEvmProvider {
    pub fn new(chain_order: Vec<SpecificChain>, api_key: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.multichainprice.example/v1/token".to_string(),
            api_key,
            chain_order,
            gate: RequestGate::standard(),
            cache: ProviderCache::new(cache_ttl),
        }
    }

    async fn fetch_on_chain(
        &self,
        token_address: &str,
        chain: SpecificChain,
    ) -> Option<PriceQuote> {
        if let Some(quote) = self.cache.get(chain, token_address) {
            return Some(quote);
        }

        let quote = retry_with_backoff(self.name(), || async {
            self.gate.wait().await;
            let mut req = self
                .client
                .get(format!("{}/{}/{}", self.base_url, chain.as_str(), token_address));
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

            let parsed: MultiChainResponse = resp
                .json()
                .await
                .map_err(|_| UpstreamFailure::Transient)?;

            // A `priceStatus` of `inProgress` means the upstream hasn't
            // settled a price yet — treated as absence and retried within
            // this call's own backoff budget, then this chain is skipped
            // like any other miss.
            if parsed.price_status.as_deref() == Some("inProgress") {
                return Err(UpstreamFailure::Transient);
            }

            let price_usd = parsed.price.and_then(|p| p.amount).filter(|p| *p > Decimal::ZERO);
            Ok(price_usd.map(|price_usd| PriceQuote {
                price_usd,
                chain: Chain::Evm,
                specific_chain: chain,
            }))
        })
        .await?;

        self.cache.put(chain, token_address, quote);
        Some(quote)
    }
}

#[derive(Debug, Deserialize)]
struct MultiChainResponse {
    price: Option<MultiChainPriceAmount>,
    #[serde(rename = "priceStatus")]
    price_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MultiChainPriceAmount {
    amount: Option<Decimal>,
}

#[async_trait]
impl PriceProvider for MultiChainEvmProvider {
    fn name(&self) -> &str {
        "multichain-evm"
    }

    async fn get_price(
        &self,
        token_address: &str,
        chain: Chain,
        specific_chain: Option<SpecificChain>,
    ) -> Option<PriceQuote> {
        if chain != Chain::Evm {
            return None;
        }

        if let Some(hint) = specific_chain {
            return self.fetch_on_chain(token_address, hint).await;
        }

        for candidate in &self.chain_order {
            if let Some(quote) = self.fetch_on_chain(token_address, *candidate).await {
                return Some(quote);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_order_defaults_to_config_order() {
        let provider = MultiChainEvmProvider::new(
            vec![SpecificChain::Base, SpecificChain::Eth],
            None,
            Duration::from_secs(30),
        );
        assert_eq!(provider.chain_order, vec![SpecificChain::Base, SpecificChain::Eth]);
    }
}
