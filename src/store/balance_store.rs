//! Team token balances.
//!
//! Read functions take a `&SqlitePool` directly; `adjust` takes a
//! `&mut SqliteConnection` (the type a `Transaction` derefs to) so
//! `trade::execute_trade` can debit and credit inside one transaction
//! alongside the trade row insert, without the store layer knowing
//! anything about transactions itself.
//!
//! Every function normalizes `token_address` on the way in, so a balance
//! seeded or debited through a checksummed address and one looked up in
//! lowercase always hit the same row.

use crate::chain::{normalize_address, SpecificChain};
use crate::store::get_decimal;
use crate::types::{Balance, TeamId};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};

pub async fn get(
    pool: &SqlitePool,
    team_id: TeamId,
    token_address: &str,
) -> Result<Option<Balance>, sqlx::Error> {
    let token_address = normalize_address(token_address);
    let row = sqlx::query(
        "SELECT team_id, token_address, specific_chain, amount FROM balances WHERE team_id = ? AND token_address = ?",
    )
    .bind(team_id.0.to_string())
    .bind(token_address)
    .fetch_optional(pool)
    .await?;

    row.map(|row| row_to_balance(&row, team_id)).transpose()
}

pub async fn list_for_team(pool: &SqlitePool, team_id: TeamId) -> Result<Vec<Balance>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT team_id, token_address, specific_chain, amount FROM balances WHERE team_id = ?",
    )
    .bind(team_id.0.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(|row| row_to_balance(row, team_id)).collect()
}

/// Sets a balance outright. Used to seed initial balances on registration;
/// trade settlement uses `adjust` instead so debit/credit stay atomic.
pub async fn set(
    pool: &SqlitePool,
    team_id: TeamId,
    token_address: &str,
    specific_chain: Option<SpecificChain>,
    amount: Decimal,
) -> Result<(), sqlx::Error> {
    let token_address = normalize_address(token_address);
    sqlx::query(
        "INSERT INTO balances (team_id, token_address, specific_chain, amount) VALUES (?, ?, ?, ?)
         ON CONFLICT (team_id, token_address) DO UPDATE SET amount = excluded.amount, specific_chain = excluded.specific_chain",
    )
    .bind(team_id.0.to_string())
    .bind(token_address)
    .bind(specific_chain.map(|c| c.as_str()))
    .bind(amount.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Adds `delta` (negative to debit) to a team's balance for a token within
/// an open transaction, creating the row at zero first if absent, and
/// returns the new amount. Callers are responsible for the
/// non-negative-balance invariant; this function does not check it.
/// Sqlite has no decimal column type, so the read-modify-write happens in
/// Rust with `rust_decimal` rather than in SQL, where it would have to go
/// through floating point.
pub async fn adjust(
    conn: &mut SqliteConnection,
    team_id: TeamId,
    token_address: &str,
    specific_chain: Option<SpecificChain>,
    delta: Decimal,
) -> Result<Decimal, sqlx::Error> {
    let token_address = normalize_address(token_address);
    let row = sqlx::query(
        "SELECT team_id, token_address, specific_chain, amount FROM balances WHERE team_id = ? AND token_address = ?",
    )
    .bind(team_id.0.to_string())
    .bind(&token_address)
    .fetch_optional(&mut *conn)
    .await?;

    let current = row
        .map(|row| row_to_balance(&row, team_id))
        .transpose()?
        .map(|b| b.amount)
        .unwrap_or(Decimal::ZERO);
    let new_amount = current + delta;

    sqlx::query(
        "INSERT INTO balances (team_id, token_address, specific_chain, amount) VALUES (?, ?, ?, ?)
         ON CONFLICT (team_id, token_address) DO UPDATE SET amount = excluded.amount, specific_chain = excluded.specific_chain",
    )
    .bind(team_id.0.to_string())
    .bind(token_address)
    .bind(specific_chain.map(|c| c.as_str()))
    .bind(new_amount.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(new_amount)
}

fn row_to_balance(row: &sqlx::sqlite::SqliteRow, team_id: TeamId) -> Result<Balance, sqlx::Error> {
    let specific_chain: Option<String> = row.try_get("specific_chain")?;
    Ok(Balance {
        team_id,
        token_address: row.try_get("token_address")?,
        amount: get_decimal(row, "amount")?,
        specific_chain: specific_chain.and_then(|s| SpecificChain::from_str_opt(&s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        set(&pool, team.id, "0xabc", Some(SpecificChain::Base), Decimal::new(500, 0))
            .await
            .unwrap();
        let balance = get(&pool, team.id, "0xabc").await.unwrap().unwrap();
        assert_eq!(balance.amount, Decimal::new(500, 0));
    }

    #[tokio::test]
    async fn adjust_creates_row_at_zero_then_applies_delta() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        let amount = adjust(&mut tx, team.id, "0xabc", None, Decimal::new(100, 0))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(amount, Decimal::new(100, 0));

        let mut tx = pool.begin().await.unwrap();
        let amount = adjust(&mut tx, team.id, "0xabc", None, Decimal::new(-40, 0))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(amount, Decimal::new(60, 0));
    }

    #[tokio::test]
    async fn evm_lookups_are_case_insensitive() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        set(
            &pool,
            team.id,
            "0xD9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA",
            Some(SpecificChain::Base),
            Decimal::new(500, 0),
        )
        .await
        .unwrap();

        let balance = get(&pool, team.id, "0xd9aaec86b65d86f6a7b5b1b0c42ffa531710b6ca")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.amount, Decimal::new(500, 0));
    }
}
