//! Background baseline updater.
//!
//! A single task drains the store's record queue and applies windows in
//! arrival order, which preserves per-key window-close ordering without any
//! per-key locking. This is the only place in the system allowed to block
//! on persistent storage; a failed write flips the store to memory-only
//! instead of surfacing an error to the scoring path.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use common::logger::warn_if_slow;

use crate::repository::BaselineRepository;
use crate::store::BaselineStore;

pub struct BaselineUpdater {
    store: Arc<BaselineStore>,
    repo: Arc<dyn BaselineRepository>,
    lookback_days: u32,
}

impl BaselineUpdater {
    pub fn new(
        store: Arc<BaselineStore>,
        repo: Arc<dyn BaselineRepository>,
        lookback_days: u32,
    ) -> Self {
        Self {
            store,
            repo,
            lookback_days,
        }
    }

    /// Loads persisted day aggregates inside the lookback horizon and
    /// rebuilds every key's statistics from them. Called once at startup.
    pub async fn warm_start(&self, today: NaiveDate) -> Result<()> {
        let since = self.lookback_cutoff(today);
        let rows = self
            .repo
            .load_since(since)
            .await
            .context("failed to load baseline history")?;
        info!(target: "baseline", rows = rows.len(), %since, "warm start from persisted days");
        self.store.rebuild_from_days(rows);
        Ok(())
    }

    /// Slow-cadence full recompute: reload from persistence and prune rows
    /// past the forgetting window. Bounds incremental floating-point drift.
    pub async fn recompute(&self, today: NaiveDate) -> Result<()> {
        let since = self.lookback_cutoff(today);
        let pruned = self
            .repo
            .prune_before(since)
            .await
            .context("failed to prune expired baseline days")?;
        if pruned > 0 {
            debug!(target: "baseline", pruned, "dropped days past the forgetting window");
        }
        self.warm_start(today).await
    }

    /// Runs until the store is closed and its queue is drained.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        loop {
            let batch = self.store.drain_queue();
            if batch.is_empty() {
                if self.store.is_closed() {
                    info!(target: "baseline", "updater shutting down");
                    return;
                }
                self.store.wait_for_records().await;
                continue;
            }

            for window in batch {
                let Some(day_row) = self.store.apply(&window) else {
                    continue;
                };
                if self.store.is_degraded() {
                    continue;
                }
                let result = warn_if_slow(
                    "baseline_upsert_day",
                    Duration::from_millis(100),
                    self.repo.upsert_day(&day_row),
                )
                .await;
                if let Err(e) = result {
                    warn!(
                        target: "baseline",
                        error = %e,
                        key = %day_row.key,
                        "day upsert failed; continuing memory-only"
                    );
                    self.store.mark_degraded();
                }
            }
        }
    }

    fn lookback_cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - ChronoDuration::days(self.lookback_days as i64)
    }
}
