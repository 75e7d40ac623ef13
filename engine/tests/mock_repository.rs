//! In-memory stand-in for the sqlite baseline repository, shared by the
//! engine integration tests. Always succeeds; persistence failure paths are
//! covered by the baseline crate's own tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use baseline::{BaselineRepository, DayStats};
use corelib::types::StrikeKey;

#[derive(Default)]
pub struct InMemoryBaselineRepository {
    rows: Arc<Mutex<HashMap<(StrikeKey, NaiveDate), DayStats>>>,
}

#[async_trait]
impl BaselineRepository for InMemoryBaselineRepository {
    async fn load_since(&self, since: NaiveDate) -> Result<Vec<DayStats>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|row| row.day >= since)
            .cloned()
            .collect())
    }

    async fn upsert_day(&self, row: &DayStats) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert((row.key, row.day), row.clone());
        Ok(())
    }

    async fn prune_before(&self, before: NaiveDate) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let start = rows.len();
        rows.retain(|(_, day), _| *day >= before);
        Ok((start - rows.len()) as u64)
    }
}
