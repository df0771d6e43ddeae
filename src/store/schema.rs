//! Schema definition and migration.
//!
//! One big `CREATE TABLE IF NOT EXISTS` script, executed statement by
//! statement because sqlite won't run a multi-statement batch through a
//! single prepared query.

use sqlx::SqlitePool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS competitions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT
);

CREATE TABLE IF NOT EXISTS competition_teams (
    competition_id TEXT NOT NULL,
    team_id TEXT NOT NULL,
    enrolled_at TEXT NOT NULL,
    PRIMARY KEY (competition_id, team_id)
);

CREATE TABLE IF NOT EXISTS balances (
    team_id TEXT NOT NULL,
    token_address TEXT NOT NULL,
    specific_chain TEXT,
    amount TEXT NOT NULL,
    PRIMARY KEY (team_id, token_address),
    CHECK (CAST(amount AS REAL) >= 0)
);

CREATE TABLE IF NOT EXISTS trades (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    competition_id TEXT NOT NULL,
    from_token TEXT NOT NULL,
    to_token TEXT NOT NULL,
    from_amount TEXT NOT NULL,
    to_amount TEXT NOT NULL,
    price TEXT NOT NULL,
    success INTEGER NOT NULL,
    reason TEXT,
    error TEXT,
    from_chain TEXT NOT NULL,
    to_chain TEXT NOT NULL,
    from_specific_chain TEXT,
    to_specific_chain TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trades_team_id ON trades (team_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_trades_competition_id ON trades (competition_id, timestamp);

CREATE TABLE IF NOT EXISTS portfolio_snapshots (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    competition_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    total_value_usd TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_team_id ON portfolio_snapshots (team_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_snapshots_competition_id ON portfolio_snapshots (competition_id, timestamp);

CREATE TABLE IF NOT EXISTS portfolio_token_values (
    snapshot_id TEXT NOT NULL,
    token_address TEXT NOT NULL,
    amount TEXT NOT NULL,
    price_usd TEXT NOT NULL,
    value_usd TEXT NOT NULL,
    specific_chain TEXT,
    PRIMARY KEY (snapshot_id, token_address)
);

CREATE TABLE IF NOT EXISTS prices (
    token_address TEXT NOT NULL,
    specific_chain TEXT NOT NULL,
    chain TEXT NOT NULL,
    price_usd TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (token_address, specific_chain)
);
"#;

pub async fn apply(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
