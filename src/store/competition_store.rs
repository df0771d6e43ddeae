//! Competition lifecycle storage: pending -> active -> completed.

use crate::types::{Competition, CompetitionId, CompetitionStatus};
use sqlx::{Row, SqlitePool};

pub async fn create(pool: &SqlitePool, name: &str) -> Result<Competition, sqlx::Error> {
    let competition = Competition {
        id: CompetitionId::new(),
        name: name.to_string(),
        status: CompetitionStatus::Pending,
        start_date: None,
        end_date: None,
    };

    sqlx::query("INSERT INTO competitions (id, name, status, start_date, end_date) VALUES (?, ?, ?, ?, ?)")
        .bind(competition.id.0.to_string())
        .bind(&competition.name)
        .bind(competition.status.as_str())
        .bind(competition.start_date.map(|d| d.to_rfc3339()))
        .bind(competition.end_date.map(|d| d.to_rfc3339()))
        .execute(pool)
        .await?;

    Ok(competition)
}

pub async fn set_status(
    pool: &SqlitePool,
    competition_id: CompetitionId,
    status: CompetitionStatus,
) -> Result<(), sqlx::Error> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match status {
        CompetitionStatus::Active => {
            sqlx::query("UPDATE competitions SET status = ?, start_date = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(timestamp)
                .bind(competition_id.0.to_string())
                .execute(pool)
                .await?;
        }
        CompetitionStatus::Completed => {
            sqlx::query("UPDATE competitions SET status = ?, end_date = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(timestamp)
                .bind(competition_id.0.to_string())
                .execute(pool)
                .await?;
        }
        CompetitionStatus::Pending => {
            sqlx::query("UPDATE competitions SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(competition_id.0.to_string())
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

pub async fn find(
    pool: &SqlitePool,
    competition_id: CompetitionId,
) -> Result<Option<Competition>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, status, start_date, end_date FROM competitions WHERE id = ?")
        .bind(competition_id.0.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(|row| row_to_competition(&row)).transpose()
}

pub async fn active(pool: &SqlitePool) -> Result<Vec<Competition>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, name, status, start_date, end_date FROM competitions WHERE status = 'ACTIVE'")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_competition).collect()
}

fn row_to_competition(row: &sqlx::sqlite::SqliteRow) -> Result<Competition, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let start_date: Option<String> = row.try_get("start_date")?;
    let end_date: Option<String> = row.try_get("end_date")?;

    Ok(Competition {
        id: CompetitionId(id.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "id".to_string(),
            source: Box::new(e),
        })?),
        name: row.try_get("name")?,
        status: CompetitionStatus::from_str_opt(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown competition status {status}").into(),
        })?,
        start_date: start_date
            .map(|d| d.parse())
            .transpose()
            .map_err(|e: chrono::ParseError| sqlx::Error::ColumnDecode {
                index: "start_date".to_string(),
                source: Box::new(e),
            })?,
        end_date: end_date
            .map(|d| d.parse())
            .transpose()
            .map_err(|e: chrono::ParseError| sqlx::Error::ColumnDecode {
                index: "end_date".to_string(),
                source: Box::new(e),
            })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_defaults_to_pending() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let competition = create(&pool, "season-1").await.unwrap();
        assert_eq!(competition.status, CompetitionStatus::Pending);
    }

    #[tokio::test]
    async fn activating_sets_start_date() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let competition = create(&pool, "season-1").await.unwrap();
        set_status(&pool, competition.id, CompetitionStatus::Active).await.unwrap();
        let found = find(&pool, competition.id).await.unwrap().unwrap();
        assert_eq!(found.status, CompetitionStatus::Active);
        assert!(found.start_date.is_some());
    }
}
