//! Competition enrollment: which teams participate in which competition.
//!
//! The snapshot scheduler needs this to know which teams to value on a
//! tick — teams enrolled in the active competition, not every team
//! that has ever registered.

use crate::types::{CompetitionId, TeamId};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

pub async fn enroll(
    pool: &SqlitePool,
    competition_id: CompetitionId,
    team_id: TeamId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO competition_teams (competition_id, team_id, enrolled_at) VALUES (?, ?, ?)
         ON CONFLICT (competition_id, team_id) DO NOTHING",
    )
    .bind(competition_id.0.to_string())
    .bind(team_id.0.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn teams_for_competition(
    pool: &SqlitePool,
    competition_id: CompetitionId,
) -> Result<Vec<TeamId>, sqlx::Error> {
    let rows = sqlx::query("SELECT team_id FROM competition_teams WHERE competition_id = ?")
        .bind(competition_id.0.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let team_id: String = row.try_get("team_id")?;
            team_id.parse().map(TeamId).map_err(|e| sqlx::Error::ColumnDecode {
                index: "team_id".to_string(),
                source: Box::new(e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enroll_then_list_round_trips() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        let competition = crate::store::competition_store::create(&pool, "season").await.unwrap();

        enroll(&pool, competition.id, team.id).await.unwrap();
        let teams = teams_for_competition(&pool, competition.id).await.unwrap();
        assert_eq!(teams, vec![team.id]);
    }

    #[tokio::test]
    async fn enroll_is_idempotent() {
        let pool = crate::store::connect("sqlite::memory:").await.unwrap();
        let team = crate::store::team_store::register(&pool, "alpha").await.unwrap();
        let competition = crate::store::competition_store::create(&pool, "season").await.unwrap();

        enroll(&pool, competition.id, team.id).await.unwrap();
        enroll(&pool, competition.id, team.id).await.unwrap();
        let teams = teams_for_competition(&pool, competition.id).await.unwrap();
        assert_eq!(teams.len(), 1);
    }
}
