//! Wire-shape DTOs for the out-of-scope HTTP layer.
//!
//! These are not route handlers — no transport crate is wired up here —
//! but the shared vocabulary a future one would serialize, matching the
//! literal field names of the external interface described for this
//! system so that layer can be added without renaming anything.

use crate::chain::{Chain, SpecificChain};
use crate::types::Trade;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecuteRequest {
    pub from_token: String,
    pub to_token: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub slippage_tolerance: Option<Decimal>,
    pub from_chain: Option<Chain>,
    pub to_chain: Option<Chain>,
    pub from_specific_chain: Option<SpecificChain>,
    pub to_specific_chain: Option<SpecificChain>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Trade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePrices {
    pub from_token: Decimal,
    pub to_token: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteChains {
    pub from_chain: Chain,
    pub to_chain: Chain,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub from_token: String,
    pub to_token: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub exchange_rate: Decimal,
    pub slippage: Decimal,
    pub prices: QuotePrices,
    pub chains: QuoteChains,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceEntry {
    pub token: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub success: bool,
    pub team_id: String,
    pub balances: Vec<BalanceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioTokenEntry {
    pub token: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub total_value: Decimal,
    pub tokens: Vec<PortfolioTokenEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub success: bool,
    pub price: Option<Decimal>,
    pub chain: Option<Chain>,
    pub specific_chain: Option<SpecificChain>,
    pub token: String,
}
