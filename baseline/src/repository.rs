use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::DayStats;

/// Persistence seam for per-day baseline aggregates.
///
/// Implementations are responsible only for storage and row mapping; the
/// store owns all statistics. The on-disk layout is an implementation
/// choice — nothing external depends on it.
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    /// All day rows on or after `since`, across every key. Called once at
    /// startup to rebuild the rolling window.
    async fn load_since(&self, since: NaiveDate) -> Result<Vec<DayStats>>;

    /// Insert or replace the aggregate for `(key, day)`.
    async fn upsert_day(&self, row: &DayStats) -> Result<()>;

    /// Drop rows older than `before` (the forgetting window).
    async fn prune_before(&self, before: NaiveDate) -> Result<u64>;
}
