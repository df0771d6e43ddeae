//! Trade execution: the ordered precondition chain, slippage model, and
//! atomic two-leg balance mutation.
//!
//! The per-team mutex registry below keys a `DashMap<TeamId, Arc<Mutex<()>>>`
//! on team, guarding the critical section so two concurrent trades for
//! the same team never interleave their balance reads and writes.

use crate::aggregator::PriceAggregator;
use crate::chain::{classify_chain, normalize_address, Chain, SpecificChain};
use crate::config::Config;
use crate::error::{TradeError, TradeResult};
use crate::portfolio;
use crate::store::{balance_store, trade_store};
use crate::types::{CompetitionId, Trade, TradeId, TeamId};
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

/// Every field a trade-execution request carries, including
/// `slippage_tolerance`, which is accepted but left advisory — the
/// slippage model below never reads it. It exists purely so a transport
/// layer round-trips the field without data loss.
#[derive(Debug, Clone)]
pub struct ExecuteTradeParams {
    pub team_id: TeamId,
    pub competition_id: CompetitionId,
    pub from_token: String,
    pub to_token: String,
    pub from_amount: Decimal,
    pub reason: Option<String>,
    pub slippage_tolerance: Option<Decimal>,
    pub from_specific_chain: Option<SpecificChain>,
    pub to_specific_chain: Option<SpecificChain>,
}

pub struct TradeEngine {
    pool: SqlitePool,
    aggregator: Arc<PriceAggregator>,
    config: Arc<Config>,
    team_locks: DashMap<TeamId, Arc<AsyncMutex<()>>>,
}

impl TradeEngine {
    pub fn new(pool: SqlitePool, aggregator: Arc<PriceAggregator>, config: Arc<Config>) -> Self {
        Self {
            pool,
            aggregator,
            config,
            team_locks: DashMap::new(),
        }
    }

    fn team_lock(&self, team_id: TeamId) -> Arc<AsyncMutex<()>> {
        self.team_locks
            .entry(team_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn execute_trade(&self, params: ExecuteTradeParams) -> TradeResult<Trade> {
        self.validate_shape(&params)?;

        let from_token = normalize_address(&params.from_token);
        let to_token = normalize_address(&params.to_token);

        let lock = self.team_lock(params.team_id);
        let _guard = lock.lock().await;

        let balance = balance_store::get(&self.pool, params.team_id, &from_token).await?;
        let current_amount = balance.map(|b| b.amount).unwrap_or(Decimal::ZERO);
        if current_amount < params.from_amount {
            return Err(TradeError::InsufficientBalance(format!(
                "balance {current_amount} of {from_token} is less than requested {}",
                params.from_amount
            )));
        }

        let from_chain = params
            .from_specific_chain
            .map(|c| c.general_chain())
            .unwrap_or_else(|| classify_chain(&from_token));
        let to_chain = params
            .to_specific_chain
            .map(|c| c.general_chain())
            .unwrap_or_else(|| classify_chain(&to_token));

        self.check_cross_chain_policy(from_chain, to_chain, params.from_specific_chain, params.to_specific_chain)?;

        let from_quote = self
            .aggregator
            .get_price(&from_token, params.from_specific_chain)
            .await
            .ok_or(TradeError::NoPrice)?;
        let to_quote = self
            .aggregator
            .get_price(&to_token, params.to_specific_chain)
            .await
            .ok_or(TradeError::NoPrice)?;

        let from_value_usd = params.from_amount * from_quote.price_usd;
        let portfolio_usd = portfolio::portfolio_value(&self.pool, &self.aggregator, params.team_id).await?;
        let max_allowed = self.config.max_portfolio_fraction * portfolio_usd;
        if from_value_usd > max_allowed {
            return Err(TradeError::ExceedsMaxSize(format!(
                "trade value {from_value_usd} exceeds {max_allowed} ({}% of portfolio)",
                self.config.max_portfolio_fraction * Decimal::new(100, 0)
            )));
        }

        let to_amount = apply_slippage(from_value_usd, to_quote.price_usd);

        let mut tx = self.pool.begin().await?;
        let new_from_amount = balance_store::adjust(
            &mut tx,
            params.team_id,
            &from_token,
            params.from_specific_chain,
            -params.from_amount,
        )
        .await?;
        if new_from_amount < Decimal::ZERO {
            tx.rollback().await?;
            return Err(TradeError::InsufficientBalance(format!(
                "balance for {from_token} went negative under concurrent trades"
            )));
        }
        balance_store::adjust(
            &mut tx,
            params.team_id,
            &to_token,
            params.to_specific_chain,
            to_amount,
        )
        .await?;

        let trade = Trade {
            id: TradeId::new(),
            team_id: params.team_id,
            competition_id: params.competition_id,
            from_token: from_token.clone(),
            to_token: to_token.clone(),
            from_amount: params.from_amount,
            to_amount,
            price: to_amount / params.from_amount,
            success: true,
            reason: params.reason.clone(),
            error: None,
            from_chain,
            to_chain,
            from_specific_chain: params.from_specific_chain.or(Some(from_quote.specific_chain)),
            to_specific_chain: params.to_specific_chain.or(Some(to_quote.specific_chain)),
            timestamp: Utc::now(),
        };
        trade_store::insert(&mut tx, &trade).await?;
        tx.commit().await?;

        info!(
            team_id = %params.team_id,
            from = %trade.from_token,
            to = %trade.to_token,
            from_amount = %trade.from_amount,
            to_amount = %trade.to_amount,
            "trade executed"
        );

        Ok(trade)
    }

    /// Read-only counterpart of `execute_trade` for the out-of-scope
    /// `/trade/quote` endpoint: runs every precondition and the slippage
    /// model but never touches a balance or the trade table.
    pub async fn quote(&self, params: &ExecuteTradeParams) -> TradeResult<QuoteOutcome> {
        self.validate_shape(params)?;

        let from_token = normalize_address(&params.from_token);
        let to_token = normalize_address(&params.to_token);

        let balance = balance_store::get(&self.pool, params.team_id, &from_token).await?;
        let current_amount = balance.map(|b| b.amount).unwrap_or(Decimal::ZERO);
        if current_amount < params.from_amount {
            return Err(TradeError::InsufficientBalance(format!(
                "balance {current_amount} of {from_token} is less than requested {}",
                params.from_amount
            )));
        }

        let from_chain = params
            .from_specific_chain
            .map(|c| c.general_chain())
            .unwrap_or_else(|| classify_chain(&from_token));
        let to_chain = params
            .to_specific_chain
            .map(|c| c.general_chain())
            .unwrap_or_else(|| classify_chain(&to_token));
        self.check_cross_chain_policy(from_chain, to_chain, params.from_specific_chain, params.to_specific_chain)?;

        let from_quote = self
            .aggregator
            .get_price(&from_token, params.from_specific_chain)
            .await
            .ok_or(TradeError::NoPrice)?;
        let to_quote = self
            .aggregator
            .get_price(&to_token, params.to_specific_chain)
            .await
            .ok_or(TradeError::NoPrice)?;

        let from_value_usd = params.from_amount * from_quote.price_usd;
        let portfolio_usd = portfolio::portfolio_value(&self.pool, &self.aggregator, params.team_id).await?;
        let max_allowed = self.config.max_portfolio_fraction * portfolio_usd;
        if from_value_usd > max_allowed {
            return Err(TradeError::ExceedsMaxSize(format!(
                "trade value {from_value_usd} exceeds {max_allowed}"
            )));
        }

        let to_amount = apply_slippage(from_value_usd, to_quote.price_usd);

        Ok(QuoteOutcome {
            from_amount: params.from_amount,
            to_amount,
            from_price_usd: from_quote.price_usd,
            to_price_usd: to_quote.price_usd,
            from_chain,
            to_chain,
        })
    }

    fn validate_shape(&self, params: &ExecuteTradeParams) -> TradeResult<()> {
        if params.from_amount < self.config.min_trade_from_amount {
            return Err(TradeError::Validation(format!(
                "fromAmount {} is below the minimum {}",
                params.from_amount, self.config.min_trade_from_amount
            )));
        }
        if params.from_token.eq_ignore_ascii_case(&params.to_token) {
            return Err(TradeError::Validation("fromToken and toToken must differ".to_string()));
        }
        if params.reason.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(TradeError::Validation("reason is required".to_string()));
        }
        Ok(())
    }

    fn check_cross_chain_policy(
        &self,
        from_chain: Chain,
        to_chain: Chain,
        from_specific: Option<SpecificChain>,
        to_specific: Option<SpecificChain>,
    ) -> TradeResult<()> {
        if self.config.allow_cross_chain_trading {
            return Ok(());
        }
        if from_chain != to_chain {
            return Err(TradeError::CrossChainDisallowed(
                "source and destination tokens are on different chains".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (from_specific, to_specific) {
            if from != to {
                return Err(TradeError::CrossChainDisallowed(
                    "source and destination tokens are on different specific chains".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub from_price_usd: Decimal,
    pub to_price_usd: Decimal,
    pub from_chain: Chain,
    pub to_chain: Chain,
}

/// `s_base = (fromValueUsd / 10_000) * 0.0005`, scaled by a uniform random
/// factor in `[0.9, 1.1]`. Deliberately non-deterministic — callers must
/// tolerate a range of `to_amount` outcomes, not an exact value.
fn apply_slippage(from_value_usd: Decimal, to_price_usd: Decimal) -> Decimal {
    let base_rate = Decimal::from_str("0.0005").unwrap();
    let s_base = (from_value_usd / Decimal::new(10_000, 0)) * base_rate;
    let random_factor = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
    let random_factor = Decimal::from_str(&format!("{random_factor:.6}")).unwrap();
    let s_actual = s_base * random_factor;
    let effective_from_value = from_value_usd * (Decimal::ONE - s_actual);
    effective_from_value / to_price_usd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::PriceAggregator;
    use crate::providers::{PriceProvider, PriceQuote};
    use async_trait::async_trait;

    struct FixedPriceProvider {
        price: Decimal,
    }

    #[async_trait]
    impl PriceProvider for FixedPriceProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn get_price(
            &self,
            _token_address: &str,
            chain: Chain,
            specific_chain: Option<SpecificChain>,
        ) -> Option<PriceQuote> {
            Some(PriceQuote {
                price_usd: self.price,
                chain,
                specific_chain: specific_chain.unwrap_or(SpecificChain::Base),
            })
        }
    }

    async fn engine_with_fixed_price(price: Decimal) -> (TradeEngine, SqlitePool, TeamId, CompetitionId) {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        let competition = crate::store::competition_store::create(&pool, "season").await.unwrap();
        balance_store::set(&pool, team.id, "0xUSDC", Some(SpecificChain::Base), Decimal::new(5000, 0))
            .await
            .unwrap();

        let config = Arc::new(Config::for_tests());
        let provider = Arc::new(FixedPriceProvider { price });
        let aggregator = Arc::new(PriceAggregator::new(pool.clone(), vec![provider], config.clone()));
        let engine = TradeEngine::new(pool.clone(), aggregator, config);
        (engine, pool, team.id, competition.id)
    }

    #[tokio::test]
    async fn rejects_amount_below_minimum() {
        let (engine, _pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let result = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "0xWETH".to_string(),
                from_amount: Decimal::ZERO,
                reason: None,
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Base),
            })
            .await;
        assert!(matches!(result, Err(TradeError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_missing_reason() {
        let (engine, _pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let result = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "0xWETH".to_string(),
                from_amount: Decimal::new(10, 0),
                reason: None,
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Base),
            })
            .await;
        assert!(matches!(result, Err(TradeError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_insufficient_balance() {
        let (engine, _pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let result = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "0xWETH".to_string(),
                from_amount: Decimal::new(10_000, 0),
                reason: Some("test".to_string()),
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Base),
            })
            .await;
        assert!(matches!(result, Err(TradeError::InsufficientBalance(_))));
    }

    #[tokio::test]
    async fn successful_trade_mutates_both_balances_atomically() {
        let (engine, pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let trade = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "0xWETH".to_string(),
                from_amount: Decimal::new(1000, 0),
                reason: Some("test".to_string()),
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Base),
            })
            .await
            .unwrap();

        assert!(trade.success);
        let from_balance = balance_store::get(&pool, team_id, "0xUSDC").await.unwrap().unwrap();
        assert_eq!(from_balance.amount, Decimal::new(4000, 0));
        let to_balance = balance_store::get(&pool, team_id, "0xWETH").await.unwrap().unwrap();
        assert!(to_balance.amount > Decimal::ZERO);
        // slippage keeps to_amount within 10% of the no-slippage amount.
        assert!(to_balance.amount <= Decimal::new(1000, 0));
        assert!(to_balance.amount >= Decimal::new(990, 0));
    }

    #[tokio::test]
    async fn cross_chain_trade_rejected_when_disallowed() {
        let (engine, _pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let result = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "So11111111111111111111111111111111111111112".to_string(),
                from_amount: Decimal::new(10, 0),
                reason: Some("test".to_string()),
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Svm),
            })
            .await;
        assert!(matches!(result, Err(TradeError::CrossChainDisallowed(_))));
    }

    #[tokio::test]
    async fn rejects_trade_exceeding_portfolio_fraction() {
        let (engine, _pool, team_id, competition_id) = engine_with_fixed_price(Decimal::ONE).await;
        let result = engine
            .execute_trade(ExecuteTradeParams {
                team_id,
                competition_id,
                from_token: "0xUSDC".to_string(),
                to_token: "0xWETH".to_string(),
                from_amount: Decimal::new(1300, 0),
                reason: Some("test".to_string()),
                slippage_tolerance: None,
                from_specific_chain: Some(SpecificChain::Base),
                to_specific_chain: Some(SpecificChain::Base),
            })
            .await;
        assert!(matches!(result, Err(TradeError::ExceedsMaxSize(_))));
    }
}
