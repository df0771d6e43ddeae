//! Native SVM price source.
//!
//! Solana tokens have only one chain to ask about, so this provider
//! skips the chain-ordering dance `multichain_evm` has to do and goes
//! straight to a single upstream: Jupiter's public price endpoint.

use super::{retry_with_backoff, PriceProvider, PriceQuote, ProviderCache, RequestGate, UpstreamFailure};
use crate::chain::{Chain, SpecificChain};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://price.jup.ag/v6/price";

pub struct SolanaNativeProvider {
    client: reqwest::Client,
    base_url: String,
    gate: RequestGate,
    cache: ProviderCache,
}

impl SolanaNativeProvider {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            gate: RequestGate::standard(),
            cache: ProviderCache::new(cache_ttl),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JupiterPriceResponse {
    data: std::collections::HashMap<String, JupiterPriceEntry>,
}

#[derive(Debug, Deserialize)]
struct JupiterPriceEntry {
    price: Decimal,
}

#[async_trait]
impl PriceProvider for SolanaNativeProvider {
    fn name(&self) -> &str {
        "solana-native"
    }

    async fn get_price(
        &self,
        token_address: &str,
        chain: Chain,
        _specific_chain: Option<SpecificChain>,
    ) -> Option<PriceQuote> {
        if chain != Chain::Svm {
            return None;
        }

        if let Some(quote) = self.cache.get(SpecificChain::Svm, token_address) {
            return Some(quote);
        }

        let quote = retry_with_backoff(self.name(), || async {
            self.gate.wait().await;
            let resp = self
                .client
                .get(&self.base_url)
                .query(&[("ids", token_address)])
                .send()
                .await
                .map_err(|_| UpstreamFailure::Transient)?;

            if resp.status().is_client_error() {
                return Ok(None);
            }
            if resp.status().is_server_error() {
                return Err(UpstreamFailure::Transient);
            }

            let parsed: JupiterPriceResponse = resp
                .json()
                .await
                .map_err(|_| UpstreamFailure::Transient)?;

            Ok(parsed.data.get(token_address).map(|entry| PriceQuote {
                price_usd: entry.price,
                chain: Chain::Svm,
                specific_chain: SpecificChain::Svm,
            }))
        })
        .await?;

        self.cache.put(SpecificChain::Svm, token_address, quote);
        Some(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_roundtrips_a_quote() {
        let provider = SolanaNativeProvider::new(Duration::from_secs(30));
        let quote = PriceQuote {
            price_usd: Decimal::new(150, 2),
            chain: Chain::Svm,
            specific_chain: SpecificChain::Svm,
        };
        provider.cache.put(SpecificChain::Svm, "mint", quote);
        assert_eq!(provider.cache.get(SpecificChain::Svm, "mint"), Some(quote));
    }
}
