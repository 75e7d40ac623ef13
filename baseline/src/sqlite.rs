//! SQLite-backed implementation of `BaselineRepository`.
//!
//! Holds one row per (strike, side, day) with the Welford components of
//! that day's pressure-ratio distribution. Enough to rebuild the rolling
//! baseline on restart by merging days inside the lookback horizon.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use corelib::types::{OptionSide, StrikeKey};

use crate::model::DayStats;
use crate::repository::BaselineRepository;

pub struct SqliteBaselineRepository {
    pool: SqlitePool,
}

impl SqliteBaselineRepository {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and ensure the schema exists.
    pub async fn new(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS baseline_days (
  strike_cents BIGINT NOT NULL,
  side TEXT NOT NULL CHECK (side IN ('C', 'P')),
  day TEXT NOT NULL,
  window_count BIGINT NOT NULL,
  mean REAL NOT NULL,
  m2 REAL NOT NULL,
  PRIMARY KEY (strike_cents, side, day)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_baseline_days_day ON baseline_days(day);"#)
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl BaselineRepository for SqliteBaselineRepository {
    async fn load_since(&self, since: NaiveDate) -> Result<Vec<DayStats>> {
        let rows = sqlx::query(
            r#"
SELECT strike_cents, side, day, window_count, mean, m2
FROM baseline_days
WHERE day >= ?
ORDER BY strike_cents, side, day;
"#,
        )
        .bind(since.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_day_stats(&r) {
                Ok(d) => out.push(d),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the load
                    tracing::warn!(error = %e, "skipping malformed baseline row");
                }
            }
        }
        Ok(out)
    }

    async fn upsert_day(&self, row: &DayStats) -> Result<()> {
        sqlx::query(
            r#"
INSERT INTO baseline_days (strike_cents, side, day, window_count, mean, m2)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (strike_cents, side, day)
DO UPDATE SET window_count = excluded.window_count,
              mean = excluded.mean,
              m2 = excluded.m2;
"#,
        )
        .bind(row.key.strike_cents)
        .bind(side_to_str(row.key.side))
        .bind(row.day.to_string())
        .bind(row.count as i64)
        .bind(row.mean)
        .bind(row.m2)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_before(&self, before: NaiveDate) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM baseline_days WHERE day < ?;"#)
            .bind(before.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn side_to_str(side: OptionSide) -> &'static str {
    match side {
        OptionSide::Call => "C",
        OptionSide::Put => "P",
    }
}

fn row_to_day_stats(row: &sqlx::sqlite::SqliteRow) -> Result<DayStats> {
    let strike_cents: i64 = row.get("strike_cents");
    let side_str: String = row.get("side");
    let side = match side_str.as_str() {
        "C" => OptionSide::Call,
        "P" => OptionSide::Put,
        other => anyhow::bail!("unknown option side: {other}"),
    };
    let day_str: String = row.get("day");
    let day: NaiveDate = day_str.parse()?;
    let count: i64 = row.get("window_count");
    Ok(DayStats {
        key: StrikeKey::new(strike_cents, side),
        day,
        count: count.max(0) as u64,
        mean: row.get("mean"),
        m2: row.get("m2"),
    })
}
