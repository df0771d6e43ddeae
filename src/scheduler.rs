//! Portfolio snapshot scheduler.
//!
//! A process-wide periodic task with an explicit `{Init, Running,
//! Stopped}` lifecycle: it can be started once, stopped cooperatively,
//! and never double-started.

use crate::aggregator::PriceAggregator;
use crate::store::{balance_store, competition_store, enrollment_store, snapshot_store};
use crate::types::{PortfolioSnapshot, PortfolioTokenValue, SnapshotId};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

const STATE_INIT: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

pub struct SnapshotScheduler {
    pool: SqlitePool,
    aggregator: Arc<PriceAggregator>,
    interval: std::time::Duration,
    state: AtomicU8,
    stop_signal: Notify,
}

impl SnapshotScheduler {
    pub fn new(pool: SqlitePool, aggregator: Arc<PriceAggregator>, interval: std::time::Duration) -> Self {
        Self {
            pool,
            aggregator,
            interval,
            state: AtomicU8::new(STATE_INIT),
            stop_signal: Notify::new(),
        }
    }

    /// Spawns the periodic snapshot task. A no-op if already running or
    /// already stopped — starting is a one-shot transition out of `Init`.
    pub fn start(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(STATE_INIT, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("snapshot scheduler start() called outside Init state; ignoring");
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.run_loop().await;
        });
    }

    /// Signals the loop to exit at the next tick boundary. Idempotent:
    /// calling it more than once, or before `start`, is harmless.
    pub fn stop(&self) {
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_RUNNING
    }

    async fn run_loop(self: Arc<Self>) {
        info!(interval_ms = self.interval.as_millis() as u64, "snapshot scheduler started");

        loop {
            tokio::select! {
                _ = self.stop_signal.notified() => {
                    info!("snapshot scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    if self.state.load(Ordering::SeqCst) != STATE_RUNNING {
                        return;
                    }
                    // Ticks never overlap: each tick is awaited to completion
                    // before the next sleep is scheduled.
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "snapshot tick failed");
                    }
                }
            }
        }
    }

    /// Snapshots every team enrolled in every ACTIVE competition. Exposed
    /// directly so tests can drive a single tick deterministically instead
    /// of waiting on the real interval.
    pub async fn tick(&self) -> Result<(), sqlx::Error> {
        let competitions = competition_store::active(&self.pool).await?;
        for competition in competitions {
            let team_ids = enrollment_store::teams_for_competition(&self.pool, competition.id).await?;
            for team_id in team_ids {
                let balances = balance_store::list_for_team(&self.pool, team_id).await?;
                let snapshot_id = SnapshotId::new();
                let mut token_values = Vec::with_capacity(balances.len());
                let mut total = rust_decimal::Decimal::ZERO;

                for balance in balances {
                    if balance.amount.is_zero() {
                        continue;
                    }
                    let Some(quote) = self
                        .aggregator
                        .get_price(&balance.token_address, balance.specific_chain)
                        .await
                    else {
                        warn!(token = %balance.token_address, "no price for snapshot token; skipping");
                        continue;
                    };
                    let value_usd = balance.amount * quote.price_usd;
                    total += value_usd;
                    token_values.push(PortfolioTokenValue {
                        snapshot_id,
                        token_address: balance.token_address,
                        amount: balance.amount,
                        price_usd: quote.price_usd,
                        value_usd,
                        specific_chain: balance.specific_chain,
                    });
                }

                let snapshot = PortfolioSnapshot {
                    id: snapshot_id,
                    team_id,
                    competition_id: competition.id,
                    timestamp: chrono::Utc::now(),
                    total_value_usd: total,
                };
                snapshot_store::record(&self.pool, &snapshot, &token_values).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, SpecificChain};
    use crate::config::Config;
    use crate::providers::{PriceProvider, PriceQuote};
    use crate::store;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct FixedPriceProvider;

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
                price_usd: Decimal::ONE,
                chain,
                specific_chain: specific_chain.unwrap_or(SpecificChain::Base),
            })
        }
    }

    #[tokio::test]
    async fn tick_records_one_snapshot_per_active_team() {
        let pool = store::connect("sqlite::memory:").await.unwrap();
        let team = store::team_store::register(&pool, "alpha").await.unwrap();
        let competition = store::competition_store::create(&pool, "season").await.unwrap();
        store::competition_store::set_status(&pool, competition.id, crate::types::CompetitionStatus::Active)
            .await
            .unwrap();
        store::enrollment_store::enroll(&pool, competition.id, team.id).await.unwrap();
        store::balance_store::set(&pool, team.id, "0xUSDC", Some(SpecificChain::Base), Decimal::new(5000, 0))
            .await
            .unwrap();

        let aggregator = Arc::new(PriceAggregator::new(
            pool.clone(),
            vec![Arc::new(FixedPriceProvider)],
            Arc::new(Config::for_tests()),
        ));
        let scheduler = SnapshotScheduler::new(pool.clone(), aggregator, Duration::from_secs(1));
        scheduler.tick().await.unwrap();

        let history = store::snapshot_store::history_for_team(&pool, team.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total_value_usd, Decimal::new(5000, 0));
    }

    #[tokio::test]
    async fn tick_skips_teams_not_enrolled_in_the_active_competition() {
        let pool = store::connect("sqlite::memory:").await.unwrap();
        let enrolled = store::team_store::register(&pool, "alpha").await.unwrap();
        let bystander = store::team_store::register(&pool, "bravo").await.unwrap();
        let competition = store::competition_store::create(&pool, "season").await.unwrap();
        store::competition_store::set_status(&pool, competition.id, crate::types::CompetitionStatus::Active)
            .await
            .unwrap();
        store::enrollment_store::enroll(&pool, competition.id, enrolled.id).await.unwrap();
        store::balance_store::set(&pool, enrolled.id, "0xUSDC", Some(SpecificChain::Base), Decimal::new(5000, 0))
            .await
            .unwrap();
        store::balance_store::set(&pool, bystander.id, "0xUSDC", Some(SpecificChain::Base), Decimal::new(5000, 0))
            .await
            .unwrap();

        let aggregator = Arc::new(PriceAggregator::new(
            pool.clone(),
            vec![Arc::new(FixedPriceProvider)],
            Arc::new(Config::for_tests()),
        ));
        let scheduler = SnapshotScheduler::new(pool.clone(), aggregator, Duration::from_secs(1));
        scheduler.tick().await.unwrap();

        assert_eq!(store::snapshot_store::history_for_team(&pool, enrolled.id, 10).await.unwrap().len(), 1);
        assert_eq!(store::snapshot_store::history_for_team(&pool, bystander.id, 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let pool = store::connect("sqlite::memory:").await.unwrap();
        let aggregator = Arc::new(PriceAggregator::new(pool.clone(), vec![], Arc::new(Config::for_tests())));
        let scheduler = Arc::new(SnapshotScheduler::new(pool, aggregator, Duration::from_millis(50)));

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scheduler.is_running());
    }
}
