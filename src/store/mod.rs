//! Persistence layer.
//!
//! Sqlite via `sqlx`: a relational store giving real transactions and
//! unique indices, but self-contained (in-memory or single-file) so
//! tests don't need an external service.

pub mod balance_store;
pub mod competition_store;
pub mod enrollment_store;
pub mod price_store;
pub mod schema;
pub mod snapshot_store;
pub mod team_store;
pub mod trade_store;

use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Opens a connection pool and applies the schema. `database_url` is an
/// sqlx sqlite URL — `sqlite::memory:` for tests, `sqlite:data.db` for a
/// real deployment.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    schema::apply(&pool).await?;
    Ok(pool)
}

/// Parses a `TEXT`-stored decimal column, mapping a failure to a
/// `sqlx::Error::ColumnDecode` so callers can propagate it with `?`
/// exactly like any other storage error. Money is stored as text (not
/// `REAL`) so we never round-trip through floating point.
pub fn decode_decimal(value: &str, column: &'static str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub fn get_decimal(row: &sqlx::sqlite::SqliteRow, column: &'static str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    decode_decimal(&raw, column)
}
