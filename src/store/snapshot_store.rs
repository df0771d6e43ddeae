//! Portfolio snapshot storage.
//!
//! A snapshot row plus its per-token breakdown rows are always written
//! together from `scheduler`; read-back (`history_for_team`) is what the
//! out-of-scope HTTP layer would expose as a portfolio value chart.

use crate::chain::SpecificChain;
use crate::store::get_decimal;
use crate::types::{CompetitionId, PortfolioSnapshot, PortfolioTokenValue, SnapshotId, TeamId};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub async fn record(
    pool: &SqlitePool,
    snapshot: &PortfolioSnapshot,
    token_values: &[PortfolioTokenValue],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO portfolio_snapshots (id, team_id, competition_id, timestamp, total_value_usd)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(snapshot.id.0.to_string())
    .bind(snapshot.team_id.0.to_string())
    .bind(snapshot.competition_id.0.to_string())
    .bind(snapshot.timestamp.to_rfc3339())
    .bind(snapshot.total_value_usd.to_string())
    .execute(&mut *tx)
    .await?;

    for value in token_values {
        sqlx::query(
            "INSERT INTO portfolio_token_values (snapshot_id, token_address, amount, price_usd, value_usd, specific_chain)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(value.snapshot_id.0.to_string())
        .bind(&value.token_address)
        .bind(value.amount.to_string())
        .bind(value.price_usd.to_string())
        .bind(value.value_usd.to_string())
        .bind(value.specific_chain.map(|c| c.as_str()))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn history_for_team(
    pool: &SqlitePool,
    team_id: TeamId,
    limit: i64,
) -> Result<Vec<PortfolioSnapshot>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, team_id, competition_id, timestamp, total_value_usd FROM portfolio_snapshots
         WHERE team_id = ? ORDER BY timestamp DESC LIMIT ?",
    )
    .bind(team_id.0.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_snapshot).collect()
}

pub async fn token_values_for_snapshot(
    pool: &SqlitePool,
    snapshot_id: SnapshotId,
) -> Result<Vec<PortfolioTokenValue>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT snapshot_id, token_address, amount, price_usd, value_usd, specific_chain
         FROM portfolio_token_values WHERE snapshot_id = ?",
    )
    .bind(snapshot_id.0.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_token_value).collect()
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<PortfolioSnapshot, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let team_id: String = row.try_get("team_id")?;
    let competition_id: String = row.try_get("competition_id")?;
    let timestamp: String = row.try_get("timestamp")?;

    Ok(PortfolioSnapshot {
        id: SnapshotId(uuid_col(&id, "id")?),
        team_id: TeamId(uuid_col(&team_id, "team_id")?),
        competition_id: CompetitionId(uuid_col(&competition_id, "competition_id")?),
        timestamp: timestamp.parse::<DateTime<Utc>>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "timestamp".to_string(),
            source: Box::new(e),
        })?,
        total_value_usd: get_decimal(row, "total_value_usd")?,
    })
}

fn row_to_token_value(row: &sqlx::sqlite::SqliteRow) -> Result<PortfolioTokenValue, sqlx::Error> {
    let snapshot_id: String = row.try_get("snapshot_id")?;
    let specific_chain: Option<String> = row.try_get("specific_chain")?;

    Ok(PortfolioTokenValue {
        snapshot_id: SnapshotId(uuid_col(&snapshot_id, "snapshot_id")?),
        token_address: row.try_get("token_address")?,
        amount: get_decimal(row, "amount")?,
        price_usd: get_decimal(row, "price_usd")?,
        value_usd: get_decimal(row, "value_usd")?,
        specific_chain: specific_chain.and_then(|s| SpecificChain::from_str_opt(&s)),
    })
}

fn uuid_col(s: &str, column: &'static str) -> Result<uuid::Uuid, sqlx::Error> {
    s.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
