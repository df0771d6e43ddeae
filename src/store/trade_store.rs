//! Trade history storage.
//!
//! `insert` takes `&mut SqliteConnection` so `trade::execute_trade` can
//! write the trade row in the same transaction as the balance debit and
//! credit: a trade and its balance effects either both land or neither do.

use crate::chain::{Chain, SpecificChain};
use crate::store::get_decimal;
use crate::types::{CompetitionId, Trade, TradeId, TeamId};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};

pub async fn insert(conn: &mut SqliteConnection, trade: &Trade) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO trades (
            id, team_id, competition_id, from_token, to_token, from_amount, to_amount, price,
            success, reason, error, from_chain, to_chain, from_specific_chain, to_specific_chain, timestamp
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(trade.id.0.to_string())
    .bind(trade.team_id.0.to_string())
    .bind(trade.competition_id.0.to_string())
    .bind(&trade.from_token)
    .bind(&trade.to_token)
    .bind(trade.from_amount.to_string())
    .bind(trade.to_amount.to_string())
    .bind(trade.price.to_string())
    .bind(trade.success)
    .bind(&trade.reason)
    .bind(&trade.error)
    .bind(trade.from_chain.to_string())
    .bind(trade.to_chain.to_string())
    .bind(trade.from_specific_chain.map(|c| c.as_str()))
    .bind(trade.to_specific_chain.map(|c| c.as_str()))
    .bind(trade.timestamp.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_for_team(pool: &SqlitePool, team_id: TeamId) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, team_id, competition_id, from_token, to_token, from_amount, to_amount, price,
                success, reason, error, from_chain, to_chain, from_specific_chain, to_specific_chain, timestamp
         FROM trades WHERE team_id = ? ORDER BY timestamp DESC",
    )
    .bind(team_id.0.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_trade).collect()
}

pub async fn list_for_competition(
    pool: &SqlitePool,
    competition_id: CompetitionId,
) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, team_id, competition_id, from_token, to_token, from_amount, to_amount, price,
                success, reason, error, from_chain, to_chain, from_specific_chain, to_specific_chain, timestamp
         FROM trades WHERE competition_id = ? ORDER BY timestamp DESC",
    )
    .bind(competition_id.0.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_trade).collect()
}

fn row_to_trade(row: &sqlx::sqlite::SqliteRow) -> Result<Trade, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let team_id: String = row.try_get("team_id")?;
    let competition_id: String = row.try_get("competition_id")?;
    let from_chain: String = row.try_get("from_chain")?;
    let to_chain: String = row.try_get("to_chain")?;
    let from_specific_chain: Option<String> = row.try_get("from_specific_chain")?;
    let to_specific_chain: Option<String> = row.try_get("to_specific_chain")?;
    let timestamp: String = row.try_get("timestamp")?;

    Ok(Trade {
        id: TradeId(uuid_col(&id, "id")?),
        team_id: TeamId(uuid_col(&team_id, "team_id")?),
        competition_id: CompetitionId(uuid_col(&competition_id, "competition_id")?),
        from_token: row.try_get("from_token")?,
        to_token: row.try_get("to_token")?,
        from_amount: get_decimal(row, "from_amount")?,
        to_amount: get_decimal(row, "to_amount")?,
        price: get_decimal(row, "price")?,
        success: row.try_get("success")?,
        reason: row.try_get("reason")?,
        error: row.try_get("error")?,
        from_chain: chain_col(&from_chain)?,
        to_chain: chain_col(&to_chain)?,
        from_specific_chain: from_specific_chain.and_then(|s| SpecificChain::from_str_opt(&s)),
        to_specific_chain: to_specific_chain.and_then(|s| SpecificChain::from_str_opt(&s)),
        timestamp: timestamp.parse::<DateTime<Utc>>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "timestamp".to_string(),
            source: Box::new(e),
        })?,
    })
}

fn uuid_col(s: &str, column: &'static str) -> Result<uuid::Uuid, sqlx::Error> {
    s.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn chain_col(s: &str) -> Result<Chain, sqlx::Error> {
    match s {
        "SVM" => Ok(Chain::Svm),
        "EVM" => Ok(Chain::Evm),
        other => Err(sqlx::Error::ColumnDecode {
            index: "chain".to_string(),
            source: format!("unknown chain {other}").into(),
        }),
    }
}
