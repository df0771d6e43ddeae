//! Team registration and lookup.
//!
//! Teams have to exist and be addressable before a balance or trade can
//! reference them, so registration/deletion live here as the natural
//! owner of initial balance seeding.

use crate::chain::normalize_address;
use crate::config::Config;
use crate::store::balance_store;
use crate::types::{Team, TeamId};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

pub async fn register(pool: &SqlitePool, name: &str) -> Result<Team, sqlx::Error> {
    let team = Team {
        id: TeamId::new(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO teams (id, name, created_at) VALUES (?, ?, ?)")
        .bind(team.id.0.to_string())
        .bind(&team.name)
        .bind(team.created_at.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(team)
}

/// Registers a team and seeds its starting balances from
/// `config.initial_balances`, resolving each `specific_chain`/symbol pair
/// to a token address via `config.specific_chain_tokens`. A symbol with no
/// matching address is skipped — there's nothing to key the balance row on.
pub async fn register_and_seed(pool: &SqlitePool, name: &str, config: &Config) -> Result<Team, sqlx::Error> {
    let team = register(pool, name).await?;

    for (chain, symbols) in &config.initial_balances {
        let Some(tokens) = config.specific_chain_tokens.get(chain) else {
            continue;
        };
        for (symbol, amount) in symbols {
            let Some(token_address) = tokens.get(symbol) else {
                continue;
            };
            let token_address = normalize_address(token_address);
            balance_store::set(pool, team.id, &token_address, Some(*chain), *amount).await?;
        }
    }

    Ok(team)
}

pub async fn delete(pool: &SqlitePool, team_id: TeamId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(team_id.0.to_string())
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM balances WHERE team_id = ?")
        .bind(team_id.0.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find(pool: &SqlitePool, team_id: TeamId) -> Result<Option<Team>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, created_at FROM teams WHERE id = ?")
        .bind(team_id.0.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| row_to_team(&row)).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Team>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, name, created_at FROM teams ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_team).collect()
}

fn row_to_team(row: &sqlx::sqlite::SqliteRow) -> Result<Team, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Team {
        id: TeamId(id.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "id".to_string(),
            source: Box::new(e),
        })?),
        name: row.try_get("name")?,
        created_at: created_at.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "created_at".to_string(),
            source: Box::new(e),
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_find_round_trips() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = register(&pool, "alpha").await.unwrap();
        let found = find(&pool, team.id).await.unwrap().unwrap();
        assert_eq!(found.name, "alpha");
    }

    #[tokio::test]
    async fn delete_removes_team_and_balances() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = register(&pool, "beta").await.unwrap();
        delete(&pool, team.id).await.unwrap();
        assert!(find(&pool, team.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_and_seed_applies_configured_initial_balances() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let config = Config::for_tests();
        let team = register_and_seed(&pool, "gamma", &config).await.unwrap();

        let balance = crate::store::balance_store::get(
            &pool,
            team.id,
            "0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(balance.amount, rust_decimal::Decimal::new(5000, 0));
    }
}
