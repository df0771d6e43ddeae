//! Price provider contract and shared provider plumbing.
//!
//! Each concrete provider (`solana`, `dexscreener`, `multichain_evm`)
//! implements [`PriceProvider`] and is held by the aggregator as a
//! trait object, the same way `paper_trading::engine` holds
//! `Collector`/`Strategy`/`Executor` as `Box<dyn _>` and treats them
//! uniformly.

pub mod dexscreener;
pub mod multichain_evm;
pub mod solana;

use crate::chain::{Chain, SpecificChain};
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

/// A resolved price observation from a single provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price_usd: Decimal,
    pub chain: Chain,
    pub specific_chain: SpecificChain,
}

/// Uniform capability set every price source exposes. `get_price`
/// returning `None` means "no price" — not an error; providers never
/// propagate upstream failures to the aggregator as an error.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Diagnostic name, used in logs only.
    fn name(&self) -> &str;

    /// Resolve a price for `token_address` on `specific_chain` (or, for
    /// providers that can infer it, with `specific_chain = None`).
    async fn get_price(
        &self,
        token_address: &str,
        chain: Chain,
        specific_chain: Option<SpecificChain>,
    ) -> Option<PriceQuote>;

    /// "Returns a non-null price in a reasonable time." Default impl
    /// just defers to `get_price`.
    async fn supports(&self, token_address: &str, specific_chain: Option<SpecificChain>) -> bool {
        let chain = specific_chain
            .map(|c| c.general_chain())
            .unwrap_or(Chain::Evm);
        self.get_price(token_address, chain, specific_chain)
            .await
            .is_some()
    }
}

/// Per-instance request gate enforcing the 100ms minimum inter-request
/// interval every provider must respect.
pub struct RequestGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn standard() -> Self {
        Self::new(Duration::from_millis(100))
    }

    /// Blocks the caller until at least `min_interval` has elapsed since
    /// the previous call through this gate.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Classifies a failed upstream call so the retry loop knows whether to
/// keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// 4xx or equivalent — the token simply isn't on this chain. Do not retry.
    Terminal,
    /// 5xx, timeout, connection reset — worth another attempt.
    Transient,
}

/// Runs `attempt` up to 3 times with a 1s linear backoff step. `attempt`
/// returns `Ok(quote)` on success, `Err(UpstreamFailure)` on failure. A
/// `Terminal` failure aborts the retry loop immediately; a `Transient`
/// one is retried until the budget is exhausted.
pub async fn retry_with_backoff<F, Fut>(provider_name: &str, mut attempt: F) -> Option<PriceQuote>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<PriceQuote>, UpstreamFailure>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    const BACKOFF_STEP: Duration = Duration::from_secs(1);

    for n in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(quote) => return quote,
            Err(UpstreamFailure::Terminal) => return None,
            Err(UpstreamFailure::Transient) => {
                if n + 1 == MAX_ATTEMPTS {
                    warn!(provider = provider_name, "upstream retry budget exhausted");
                    return None;
                }
                sleep(BACKOFF_STEP * (n + 1)).await;
            }
        }
    }
    None
}

/// Small time-bounded cache keyed by `(specific_chain, token_address)`,
/// owned by each provider instance, with a TTL-gated refresh on miss.
pub struct ProviderCache {
    entries: DashMap<(SpecificChain, String), (PriceQuote, Instant)>,
    ttl: Duration,
}

impl ProviderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, specific_chain: SpecificChain, token_address: &str) -> Option<PriceQuote> {
        let key = (specific_chain, token_address.to_string());
        let entry = self.entries.get(&key)?;
        let (quote, inserted_at) = *entry;
        if inserted_at.elapsed() < self.ttl {
            Some(quote)
        } else {
            None
        }
    }

    pub fn put(&self, specific_chain: SpecificChain, token_address: &str, quote: PriceQuote) {
        self.entries
            .insert((specific_chain, token_address.to_string()), (quote, Instant::now()));
    }
}
