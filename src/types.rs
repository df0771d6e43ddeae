//! Core domain types for the simulated trading server: balances, trades,
//! portfolio snapshots and competitions. Storage adapters in `store/`
//! read and write them; `trade` and `portfolio` mutate and derive them.

use crate::chain::{Chain, SpecificChain};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(TeamId);
uuid_id!(CompetitionId);
uuid_id!(TradeId);
uuid_id!(SnapshotId);

/// A team's balance of a single token. `(team_id, token_address)` is
/// unique; `amount` is always `>= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub team_id: TeamId,
    pub token_address: String,
    pub amount: Decimal,
    pub specific_chain: Option<SpecificChain>,
}

/// An append-only observation of a token's USD price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub token_address: String,
    pub chain: Chain,
    pub specific_chain: SpecificChain,
    pub price_usd: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An immutable record of an attempted (successful or failed) trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub team_id: TeamId,
    pub competition_id: CompetitionId,
    pub from_token: String,
    pub to_token: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    /// `to_amount / from_amount`.
    pub price: Decimal,
    pub success: bool,
    pub reason: Option<String>,
    pub error: Option<String>,
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub from_specific_chain: Option<SpecificChain>,
    pub to_specific_chain: Option<SpecificChain>,
    pub timestamp: DateTime<Utc>,
}

/// A snapshot of a team's total portfolio value at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: SnapshotId,
    pub team_id: TeamId,
    pub competition_id: CompetitionId,
    pub timestamp: DateTime<Utc>,
    pub total_value_usd: Decimal,
}

/// A single token's contribution to a portfolio snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioTokenValue {
    pub snapshot_id: SnapshotId,
    pub token_address: String,
    pub amount: Decimal,
    pub price_usd: Decimal,
    pub value_usd: Decimal,
    pub specific_chain: Option<SpecificChain>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompetitionStatus {
    Pending,
    Active,
    Completed,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionStatus::Pending => "PENDING",
            CompetitionStatus::Active => "ACTIVE",
            CompetitionStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CompetitionStatus::Pending),
            "ACTIVE" => Some(CompetitionStatus::Active),
            "COMPLETED" => Some(CompetitionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
    pub status: CompetitionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
