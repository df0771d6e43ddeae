//! Last-known-price storage.
//!
//! The aggregator checks here before going to a provider: a DB hit newer
//! than `Config::price_freshness` is used as-is, skipping the network
//! entirely.

use crate::chain::{Chain, SpecificChain};
use crate::store::get_decimal;
use crate::types::PriceRecord;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub async fn upsert(pool: &SqlitePool, record: &PriceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO prices (token_address, specific_chain, chain, price_usd, timestamp) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (token_address, specific_chain) DO UPDATE SET price_usd = excluded.price_usd, timestamp = excluded.timestamp",
    )
    .bind(&record.token_address)
    .bind(record.specific_chain.as_str())
    .bind(record.chain.to_string())
    .bind(record.price_usd.to_string())
    .bind(record.timestamp.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetches the last known price for a token, preferring a row pinned to
/// `specific_chain` when given, else the most recently written row for
/// that token address across every chain.
pub async fn latest(
    pool: &SqlitePool,
    token_address: &str,
    specific_chain: Option<SpecificChain>,
) -> Result<Option<PriceRecord>, sqlx::Error> {
    let row = if let Some(chain) = specific_chain {
        sqlx::query(
            "SELECT token_address, specific_chain, chain, price_usd, timestamp FROM prices
             WHERE token_address = ? AND specific_chain = ?",
        )
        .bind(token_address)
        .bind(chain.as_str())
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query(
            "SELECT token_address, specific_chain, chain, price_usd, timestamp FROM prices
             WHERE token_address = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(token_address)
        .fetch_optional(pool)
        .await?
    };

    row.map(|row| row_to_record(&row)).transpose()
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<PriceRecord, sqlx::Error> {
    let specific_chain: String = row.try_get("specific_chain")?;
    let chain: String = row.try_get("chain")?;
    let timestamp: String = row.try_get("timestamp")?;

    let specific_chain = SpecificChain::from_str_opt(&specific_chain).ok_or_else(|| {
        sqlx::Error::ColumnDecode {
            index: "specific_chain".to_string(),
            source: format!("unknown specific chain {specific_chain}").into(),
        }
    })?;
    let chain = match chain.as_str() {
        "SVM" => Chain::Svm,
        "EVM" => Chain::Evm,
        other => {
            return Err(sqlx::Error::ColumnDecode {
                index: "chain".to_string(),
                source: format!("unknown chain {other}").into(),
            })
        }
    };
    let timestamp: DateTime<Utc> = timestamp.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: "timestamp".to_string(),
        source: Box::new(e),
    })?;

    Ok(PriceRecord {
        token_address: row.try_get("token_address")?,
        chain,
        specific_chain,
        price_usd: get_decimal(row, "price_usd")?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn upsert_then_latest_round_trips() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let record = PriceRecord {
            token_address: "0xabc".to_string(),
            chain: Chain::Evm,
            specific_chain: SpecificChain::Base,
            price_usd: Decimal::new(150, 2),
            timestamp: Utc::now(),
        };
        upsert(&pool, &record).await.unwrap();

        let found = latest(&pool, "0xabc", Some(SpecificChain::Base))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.price_usd, Decimal::new(150, 2));
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_row_for_same_chain() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let mut record = PriceRecord {
            token_address: "0xabc".to_string(),
            chain: Chain::Evm,
            specific_chain: SpecificChain::Base,
            price_usd: Decimal::new(100, 0),
            timestamp: Utc::now(),
        };
        upsert(&pool, &record).await.unwrap();
        record.price_usd = Decimal::new(200, 0);
        upsert(&pool, &record).await.unwrap();

        let found = latest(&pool, "0xabc", Some(SpecificChain::Base))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.price_usd, Decimal::new(200, 0));
    }
}
