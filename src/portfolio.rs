//! Portfolio valuation: the sum of a team's balances priced in USD.

use crate::aggregator::PriceAggregator;
use crate::store::balance_store;
use crate::types::TeamId;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::warn;

/// Sums `amount * price` over every balance a team holds. A token whose
/// price can't be resolved contributes zero to the total rather than
/// failing the whole calculation, and is logged so a stuck price feed is
/// visible without aborting every trade that needs a portfolio value.
pub async fn portfolio_value(
    pool: &SqlitePool,
    aggregator: &PriceAggregator,
    team_id: TeamId,
) -> Result<Decimal, sqlx::Error> {
    let balances = balance_store::list_for_team(pool, team_id).await?;

    let mut total = Decimal::ZERO;
    for balance in balances {
        if balance.amount.is_zero() {
            continue;
        }
        match aggregator
            .get_price(&balance.token_address, balance.specific_chain)
            .await
        {
            Some(quote) => total += balance.amount * quote.price_usd,
            None => warn!(
                team_id = %team_id,
                token = %balance.token_address,
                "no price available for portfolio valuation; contributing zero"
            ),
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, SpecificChain};
    use crate::config::Config;
    use crate::providers::{PriceProvider, PriceQuote};
    use crate::store;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedPriceProvider;

    #[async_trait]
    impl PriceProvider for FixedPriceProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn get_price(
            &self,
            token_address: &str,
            chain: Chain,
            specific_chain: Option<SpecificChain>,
        ) -> Option<PriceQuote> {
            if token_address == "0xUNPRICED" {
                return None;
            }
            Some(PriceQuote {
                price_usd: Decimal::new(2, 0),
                chain,
                specific_chain: specific_chain.unwrap_or(SpecificChain::Base),
            })
        }
    }

    #[tokio::test]
    async fn sums_priced_balances_and_skips_unpriced() {
        let pool = store::connect("sqlite::memory:").await.unwrap();
        let team = store::team_store::register(&pool, "alpha").await.unwrap();
        balance_store::set(&pool, team.id, "0xUSDC", Some(SpecificChain::Base), Decimal::new(10, 0))
            .await
            .unwrap();
        balance_store::set(&pool, team.id, "0xUNPRICED", Some(SpecificChain::Base), Decimal::new(50, 0))
            .await
            .unwrap();

        let aggregator = PriceAggregator::new(
            pool.clone(),
            vec![Arc::new(FixedPriceProvider)],
            Arc::new(Config::for_tests()),
        );

        let total = portfolio_value(&pool, &aggregator, team.id).await.unwrap();
        assert_eq!(total, Decimal::new(20, 0));
    }
}
