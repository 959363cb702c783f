use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::str::FromStr;

use crate::models::{HalfTimeScore, MatchRecord};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

pub async fn init_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            ht_home_goals INTEGER,
            ht_away_goals INTEGER,
            home_shots_on_target INTEGER,
            away_shots_on_target INTEGER,
            home_corners INTEGER,
            away_corners INTEGER,
            league TEXT NOT NULL,
            UNIQUE (match_date, home_team, away_team)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_date ON matches (match_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_league ON matches (league)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

/// Upserts on (date, home, away), so re-fetching a season refreshes its rows.
pub async fn insert_matches(pool: &SqlitePool, matches: &[MatchRecord]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for record in matches {
        sqlx::query(
            r#"
            INSERT INTO matches
            (match_date, home_team, away_team, home_goals, away_goals, ht_home_goals, ht_away_goals,
             home_shots_on_target, away_shots_on_target, home_corners, away_corners, league)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (match_date, home_team, away_team) DO UPDATE SET
                home_goals = excluded.home_goals,
                away_goals = excluded.away_goals,
                ht_home_goals = excluded.ht_home_goals,
                ht_away_goals = excluded.ht_away_goals,
                home_shots_on_target = excluded.home_shots_on_target,
                away_shots_on_target = excluded.away_shots_on_target,
                home_corners = excluded.home_corners,
                away_corners = excluded.away_corners,
                league = excluded.league
            "#,
        )
        .bind(record.date)
        .bind(&record.home_team)
        .bind(&record.away_team)
        .bind(i64::from(record.home_goals))
        .bind(i64::from(record.away_goals))
        .bind(record.half_time.map(|ht| i64::from(ht.home)))
        .bind(record.half_time.map(|ht| i64::from(ht.away)))
        .bind(record.home_shots_on_target.map(i64::from))
        .bind(record.away_shots_on_target.map(i64::from))
        .bind(record.home_corners.map(i64::from))
        .bind(record.away_corners.map(i64::from))
        .bind(&record.league)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Stored {} matches", matches.len());
    Ok(matches.len())
}

/// Every stored match, oldest first.
pub async fn load_match_history(pool: &SqlitePool) -> Result<Vec<MatchRecord>> {
    let rows = sqlx::query("SELECT * FROM matches ORDER BY match_date ASC, id ASC")
        .fetch_all(pool)
        .await?;

    let mut matches = Vec::with_capacity(rows.len());
    for row in rows {
        let half_time = match (
            count(row.get("ht_home_goals"))?,
            count(row.get("ht_away_goals"))?,
        ) {
            (Some(home), Some(away)) => Some(HalfTimeScore { home, away }),
            _ => None,
        };

        matches.push(MatchRecord {
            date: row.get::<NaiveDate, _>("match_date"),
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
            home_goals: u32::try_from(row.get::<i64, _>("home_goals"))?,
            away_goals: u32::try_from(row.get::<i64, _>("away_goals"))?,
            half_time,
            home_shots_on_target: count(row.get("home_shots_on_target"))?,
            away_shots_on_target: count(row.get("away_shots_on_target"))?,
            home_corners: count(row.get("home_corners"))?,
            away_corners: count(row.get("away_corners"))?,
            league: row.get("league"),
        });
    }

    Ok(matches)
}

pub async fn count_matches(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM matches")
        .fetch_one(pool)
        .await?;
    Ok(row.get("total"))
}

fn count(value: Option<i64>) -> Result<Option<u32>> {
    Ok(value.map(u32::try_from).transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database(&pool).await.unwrap();
        pool
    }

    fn record(day: u32, home: &str, away: &str, home_goals: u32) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals,
            away_goals: 1,
            half_time: Some(HalfTimeScore { home: 1, away: 0 }),
            home_shots_on_target: Some(6),
            away_shots_on_target: None,
            home_corners: Some(0),
            away_corners: None,
            league: "D1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_in_date_order() {
        let pool = memory_pool().await;
        let mut late = record(20, "Bayern Munich", "Dortmund", 2);
        late.half_time = None;
        insert_matches(&pool, &[late, record(3, "Leverkusen", "Stuttgart", 3)])
            .await
            .unwrap();

        let loaded = load_match_history(&pool).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], record(3, "Leverkusen", "Stuttgart", 3));
        assert_eq!(loaded[1].half_time, None);
        assert_eq!(loaded[1].home_corners, Some(0));
        assert_eq!(loaded[1].away_corners, None);
    }

    #[tokio::test]
    async fn test_reinsert_upserts() {
        let pool = memory_pool().await;
        insert_matches(&pool, &[record(3, "Leverkusen", "Stuttgart", 3)])
            .await
            .unwrap();
        insert_matches(&pool, &[record(3, "Leverkusen", "Stuttgart", 4)])
            .await
            .unwrap();

        assert_eq!(count_matches(&pool).await.unwrap(), 1);
        let loaded = load_match_history(&pool).await.unwrap();
        assert_eq!(loaded[0].home_goals, 4);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let pool = memory_pool().await;
        init_database(&pool).await.unwrap();
        assert_eq!(count_matches(&pool).await.unwrap(), 0);
    }
}
