//! Price aggregation: cache, storage freshness check, classification,
//! and provider fan-out, unified behind one `get_price` call.
//!
//! The lookup order is: in-memory cache, then the database's last known
//! price if still fresh, then the provider chain. Concurrent callers
//! asking for the same `(specific_chain, token_address)` while a lookup
//! is in flight serialize on a per-key lock rather than each issuing
//! their own upstream round.

use crate::chain::{classify_chain, normalize_address, Chain, SpecificChain};
use crate::config::Config;
use crate::providers::{PriceProvider, PriceQuote};
use crate::store::price_store;
use crate::types::PriceRecord;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type CacheKey = (Option<SpecificChain>, String);

pub struct PriceAggregator {
    pool: SqlitePool,
    providers: Vec<Arc<dyn PriceProvider>>,
    price_cache: DashMap<CacheKey, (PriceQuote, Instant)>,
    chain_memo: DashMap<String, (SpecificChain, Instant)>,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
    /// Reverse of `config.specific_chain_tokens`, normalized address ->
    /// chain, so a configured token's chain is known without a network
    /// round-trip or waiting on the chain memo to warm up.
    known_tokens: HashMap<String, SpecificChain>,
    config: Arc<Config>,
}

impl PriceAggregator {
    pub fn new(pool: SqlitePool, providers: Vec<Arc<dyn PriceProvider>>, config: Arc<Config>) -> Self {
        let known_tokens = config
            .specific_chain_tokens
            .iter()
            .flat_map(|(chain, tokens)| {
                tokens.values().map(move |address| (normalize_address(address), *chain))
            })
            .collect();

        Self {
            pool,
            providers,
            price_cache: DashMap::new(),
            chain_memo: DashMap::new(),
            inflight: DashMap::new(),
            known_tokens,
            config,
        }
    }

    /// Resolves a USD price for `token_address`, optionally pinned to
    /// `specific_chain_hint`. Returns `None` if no provider can place a
    /// price on the token within the retry budget.
    pub async fn get_price(
        &self,
        token_address: &str,
        specific_chain_hint: Option<SpecificChain>,
    ) -> Option<PriceQuote> {
        let address = normalize_address(token_address);
        let general_chain = classify_chain(&address);
        let resolved_hint = specific_chain_hint
            .or_else(|| self.known_tokens.get(&address).copied())
            .or_else(|| self.memoized_chain(&address));

        if let Some(quote) = self.cache_get(resolved_hint, &address) {
            return Some(quote);
        }

        let key: CacheKey = (resolved_hint, address.clone());
        let lock = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Someone else may have resolved this while we waited for the lock.
        if let Some(quote) = self.cache_get(resolved_hint, &address) {
            self.cleanup_inflight(&key, &lock);
            return Some(quote);
        }

        if let Some(record) = self.db_fresh_price(&address, resolved_hint).await {
            let quote = PriceQuote {
                price_usd: record.price_usd,
                chain: record.chain,
                specific_chain: record.specific_chain,
            };
            self.cache_put(resolved_hint, &address, quote);
            self.cleanup_inflight(&key, &lock);
            return Some(quote);
        }

        let quote = self
            .fan_out(&address, general_chain, resolved_hint)
            .await;

        if let Some(quote) = quote {
            self.memoize_chain(&address, quote.specific_chain);
            self.cache_put(Some(quote.specific_chain), &address, quote);
            if let Err(e) = price_store::upsert(
                &self.pool,
                &PriceRecord {
                    token_address: address.clone(),
                    chain: quote.chain,
                    specific_chain: quote.specific_chain,
                    price_usd: quote.price_usd,
                    timestamp: Utc::now(),
                },
            )
            .await
            {
                warn!(error = %e, token = %address, "failed to persist resolved price");
            }
        }

        self.cleanup_inflight(&key, &lock);
        quote
    }

    async fn fan_out(
        &self,
        address: &str,
        general_chain: Chain,
        resolved_hint: Option<SpecificChain>,
    ) -> Option<PriceQuote> {
        for provider in &self.providers {
            if let Some(quote) = provider.get_price(address, general_chain, resolved_hint).await {
                debug!(provider = provider.name(), token = address, "resolved price");
                return Some(quote);
            }
        }
        None
    }

    async fn db_fresh_price(
        &self,
        address: &str,
        resolved_hint: Option<SpecificChain>,
    ) -> Option<PriceRecord> {
        let record = price_store::latest(&self.pool, address, resolved_hint)
            .await
            .ok()
            .flatten()?;
        let age = Utc::now().signed_duration_since(record.timestamp);
        if age.to_std().ok()? < self.config.price_freshness {
            Some(record)
        } else {
            None
        }
    }

    fn cache_get(&self, resolved_hint: Option<SpecificChain>, address: &str) -> Option<PriceQuote> {
        let key = (resolved_hint, address.to_string());
        let entry = self.price_cache.get(&key)?;
        let (quote, inserted_at) = *entry;
        if inserted_at.elapsed() < self.config.price_cache_ttl {
            Some(quote)
        } else {
            None
        }
    }

    fn cache_put(&self, resolved_hint: Option<SpecificChain>, address: &str, quote: PriceQuote) {
        let key = (resolved_hint, address.to_string());
        self.price_cache.insert(key, (quote, Instant::now()));
    }

    fn memoized_chain(&self, address: &str) -> Option<SpecificChain> {
        let entry = self.chain_memo.get(address)?;
        let (chain, inserted_at) = *entry;
        if inserted_at.elapsed() < self.config.chain_memo_ttl {
            Some(chain)
        } else {
            None
        }
    }

    fn memoize_chain(&self, address: &str, chain: SpecificChain) {
        self.chain_memo.insert(address.to_string(), (chain, Instant::now()));
    }

    /// Drops the per-key lock entry if we were the last holder, so the
    /// inflight map doesn't grow forever under steady traffic.
    fn cleanup_inflight(&self, key: &CacheKey, lock: &Arc<Mutex<()>>) {
        if Arc::strong_count(lock) <= 2 {
            self.inflight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SpecificChain;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        price: Decimal,
    }

    #[async_trait]
    impl PriceProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn get_price(
            &self,
            _token_address: &str,
            chain: Chain,
            specific_chain: Option<SpecificChain>,
        ) -> Option<PriceQuote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(PriceQuote {
                price_usd: self.price,
                chain,
                specific_chain: specific_chain.unwrap_or(SpecificChain::Base),
            })
        }
    }

    #[tokio::test]
    async fn caches_repeated_lookups() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            calls: calls.clone(),
            price: Decimal::new(100, 0),
        });
        let aggregator = PriceAggregator::new(pool, vec![provider], Arc::new(Config::for_tests()));

        let first = aggregator
            .get_price("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", Some(SpecificChain::Base))
            .await;
        let second = aggregator
            .get_price("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", Some(SpecificChain::Base))
            .await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_for_same_token_coalesce() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            calls: calls.clone(),
            price: Decimal::new(42, 0),
        });
        let aggregator = Arc::new(PriceAggregator::new(
            pool,
            vec![provider],
            Arc::new(Config::for_tests()),
        ));

        let a = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                aggregator
                    .get_price("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", Some(SpecificChain::Base))
                    .await
            })
        };
        let b = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                aggregator
                    .get_price("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA", Some(SpecificChain::Base))
                    .await
            })
        };

        let (r1, r2) = tokio::join!(a, b);
        assert!(r1.unwrap().is_some());
        assert!(r2.unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
