//! Process entry point: boot configuration, storage, providers, the
//! aggregator, trade engine and snapshot scheduler, then idle until a
//! shutdown signal. No transport is wired up here — this binary is the
//! core a transport layer (HTTP, CLI, etc.) would sit in front of.

use anyhow::{Context, Result};
use clap::Parser;
use sim_trading_server::config::Config;
use sim_trading_server::providers::dexscreener::DexScreenerProvider;
use sim_trading_server::providers::multichain_evm::MultiChainEvmProvider;
use sim_trading_server::providers::solana::SolanaNativeProvider;
use sim_trading_server::providers::PriceProvider;
use sim_trading_server::{store, PriceAggregator, SnapshotScheduler, TradeEngine};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sim-trading-server", about = "Multi-tenant simulated trading core")]
struct Cli {
    /// sqlx sqlite connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://sim-trading.db?mode=rwc")]
    database_url: String,

    /// Optional TOML file with per-chain initial balances and token tables.
    #[arg(long, env = "CHAIN_TABLES_PATH", default_value = "chain_tables.toml")]
    chain_tables: String,

    /// Emit structured JSON logs instead of the pretty console format.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    info!("booting sim-trading-server");

    let config = Arc::new(Config::load(&cli.chain_tables).context("loading configuration")?);
    let pool = store::connect(&cli.database_url)
        .await
        .context("connecting to storage")?;

    let providers = build_providers(&config);
    let aggregator = Arc::new(PriceAggregator::new(pool.clone(), providers, config.clone()));
    let trade_engine = Arc::new(TradeEngine::new(pool.clone(), aggregator.clone(), config.clone()));
    let _ = trade_engine; // held by the (out-of-scope) transport layer in a full deployment

    let scheduler = Arc::new(SnapshotScheduler::new(pool, aggregator, config.snapshot_interval));
    scheduler.start();

    info!("sim-trading-server ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    scheduler.stop();

    Ok(())
}

fn build_providers(config: &Config) -> Vec<Arc<dyn PriceProvider>> {
    let mut providers: Vec<Arc<dyn PriceProvider>> = vec![Arc::new(SolanaNativeProvider::new(config.price_cache_ttl))];

    providers.push(Arc::new(MultiChainEvmProvider::new(
        config.evm_chains.clone(),
        config.provider_api_keys.multichain_evm.clone(),
        config.price_cache_ttl,
    )));

    if let Some(key) = &config.provider_api_keys.dexscreener {
        providers.push(Arc::new(DexScreenerProvider::new(
            config.dexscreener_base_url.clone(),
            Some(key.clone()),
            config.price_cache_ttl,
        )));
    } else {
        providers.push(Arc::new(DexScreenerProvider::new(
            config.dexscreener_base_url.clone(),
            None,
            config.price_cache_ttl,
        )));
    }

    providers
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
