//! Simulated crypto trading server core.
//!
//! Teams hold synthetic token balances and execute simulated swaps
//! priced against external oracles, with slippage and portfolio
//! tracking. No on-chain transaction is ever broadcast; this crate owns
//! pricing, validation, balance mutation, and periodic valuation only.
//! Transport (HTTP), auth, and an admin CLI are external collaborators.

pub mod aggregator;
pub mod api_types;
pub mod chain;
pub mod config;
pub mod error;
pub mod portfolio;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod trade;
pub mod types;

pub use aggregator::PriceAggregator;
pub use config::Config;
pub use error::{TradeError, TradeResult};
pub use scheduler::SnapshotScheduler;
pub use trade::{ExecuteTradeParams, QuoteOutcome, TradeEngine};
