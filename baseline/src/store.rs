//! In-memory baseline store with copy-on-write context publication.
//!
//! Read side: `get` returns a complete `Arc<BaselineContext>` snapshot from
//! a read-locked map. Contexts are replaced whole, never mutated in place,
//! so many evaluation threads can read while the updater writes.
//!
//! Write side: `record` is fire-and-forget. Windows land on a bounded
//! drop-oldest queue and a single background updater applies them, which
//! keeps per-key updates in window-close order and keeps the scoring path
//! free of locks held across statistics work.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, warn};

use corelib::config::EngineConfig;
use corelib::types::{PressureWindow, StrikeKey};

use crate::model::{
    BaselineContext, DEGRADED_QUALITY_FACTOR, DayStats, PercentileLadder,
};
use crate::stats::{RecentSample, RunningStats};

/// Cap on the recent-window sample kept per key for percentile
/// interpolation. Bounds memory at O(keys), independent of history length.
const SAMPLE_CAPACITY: usize = 512;

/// Writer-side mutable state for one key. Only the updater touches this.
struct KeyBaseline {
    stats: RunningStats,
    sample: RecentSample,
    /// Start of the last applied window; the replay guard.
    last_window_start_ms: Option<u64>,
    /// Accumulator for the current trading day, persisted as a `DayStats`
    /// row after every applied window.
    day: Option<NaiveDate>,
    day_stats: RunningStats,
}

impl KeyBaseline {
    fn new() -> Self {
        Self {
            stats: RunningStats::new(),
            sample: RecentSample::new(SAMPLE_CAPACITY),
            last_window_start_ms: None,
            day: None,
            day_stats: RunningStats::new(),
        }
    }
}

pub struct BaselineStore {
    expected_windows: u64,
    /// Published snapshots read by the scoring path.
    contexts: RwLock<HashMap<StrikeKey, Arc<BaselineContext>>>,
    /// Writer-side statistics, owned by the single updater.
    state: Mutex<HashMap<StrikeKey, KeyBaseline>>,

    queue: Mutex<VecDeque<PressureWindow>>,
    queue_capacity: usize,
    queue_notify: Notify,
    closed: AtomicBool,

    degraded: AtomicBool,
    dropped_records: AtomicU64,
}

impl BaselineStore {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            expected_windows: cfg.baseline_lookback_days as u64
                * cfg.expected_windows_per_day as u64,
            contexts: RwLock::new(HashMap::new()),
            state: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::with_capacity(cfg.record_queue_capacity)),
            queue_capacity: cfg.record_queue_capacity.max(1),
            queue_notify: Notify::new(),
            closed: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            dropped_records: AtomicU64::new(0),
        }
    }

    /// Synchronous context lookup for the scoring path. Never fails: keys
    /// without history get a stale-but-valid penalized default.
    pub fn get(&self, key: &StrikeKey) -> Arc<BaselineContext> {
        if let Some(ctx) = self.contexts.read().get(key) {
            return Arc::clone(ctx);
        }
        let mut ctx = BaselineContext::default_for(*key);
        if self.is_degraded() {
            ctx.data_quality *= DEGRADED_QUALITY_FACTOR;
        }
        Arc::new(ctx)
    }

    /// Fire-and-forget enqueue of a closed window. Never blocks the caller;
    /// on overflow the oldest queued window is dropped and counted as a
    /// data-quality degradation.
    pub fn record(&self, window: PressureWindow) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut queue = self.queue.lock();
            if queue.len() == self.queue_capacity {
                queue.pop_front();
                let dropped = self.dropped_records.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    target: "baseline",
                    dropped_total = dropped,
                    "record queue full; dropped oldest window"
                );
            }
            queue.push_back(window);
        }
        self.queue_notify.notify_one();
    }

    /// Stops accepting records and wakes the updater so it can drain out.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.queue_notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    /// Switches to memory-only operation and republishes every context with
    /// the degraded quality factor applied.
    pub fn mark_degraded(&self) {
        if self.degraded.swap(true, Ordering::AcqRel) {
            return;
        }
        warn!(target: "baseline", "persistence unavailable; store degraded to memory-only");
        let keys: Vec<StrikeKey> = self.contexts.read().keys().copied().collect();
        let state = self.state.lock();
        for key in keys {
            if let Some(kb) = state.get(&key) {
                self.publish(&key, kb);
            }
        }
    }

    // ---- updater-facing API ----

    pub(crate) fn drain_queue(&self) -> Vec<PressureWindow> {
        self.queue.lock().drain(..).collect()
    }

    pub(crate) async fn wait_for_records(&self) {
        self.queue_notify.notified().await;
    }

    /// Applies one closed window to its key's statistics and publishes a
    /// fresh context snapshot. Returns the updated day row for persistence,
    /// or `None` when the window is a replayed duplicate.
    pub(crate) fn apply(&self, window: &PressureWindow) -> Option<DayStats> {
        let mut state = self.state.lock();
        let kb = state.entry(window.key).or_insert_with(KeyBaseline::new);

        if let Some(last) = kb.last_window_start_ms {
            if window.start_ms <= last {
                debug!(
                    target: "baseline",
                    key = %window.key,
                    start_ms = window.start_ms,
                    "replayed window ignored"
                );
                return None;
            }
        }
        kb.last_window_start_ms = Some(window.start_ms);

        let ratio = window.pressure_ratio();
        kb.stats.push(ratio);
        kb.sample.push(ratio);

        let day = day_of_ms(window.end_ms);
        if kb.day != Some(day) {
            kb.day = Some(day);
            kb.day_stats = RunningStats::new();
        }
        kb.day_stats.push(ratio);

        self.publish(&window.key, kb);
        Some(DayStats::from_stats(window.key, day, &kb.day_stats))
    }

    /// Replaces all per-key statistics from persisted day rows. Used for
    /// warm start and for the slow-cadence full recompute that bounds
    /// incremental drift; rows outside the lookback must already be
    /// filtered by the caller's `since` cutoff.
    pub(crate) fn rebuild_from_days(&self, rows: Vec<DayStats>) {
        let mut merged: HashMap<StrikeKey, RunningStats> = HashMap::new();
        for row in rows {
            merged
                .entry(row.key)
                .or_insert_with(RunningStats::new)
                .merge(&row.to_stats());
        }

        let mut state = self.state.lock();
        for (key, stats) in merged {
            let kb = state.entry(key).or_insert_with(KeyBaseline::new);
            kb.stats = stats;
            // recent sample refills as new windows close; the ladder is
            // stale until then, mean/std are already correct
            self.publish(&key, kb);
        }
    }

    fn publish(&self, key: &StrikeKey, kb: &KeyBaseline) {
        let sorted = kb.sample.sorted();
        let mut quality = if self.expected_windows == 0 {
            1.0
        } else {
            (kb.stats.count() as f64 / self.expected_windows as f64).min(1.0)
        };
        if self.is_degraded() {
            quality *= DEGRADED_QUALITY_FACTOR;
        }

        let ctx = Arc::new(BaselineContext {
            key: *key,
            mean: kb.stats.mean(),
            std_dev: kb.stats.std_dev(),
            percentiles: PercentileLadder::from_sorted(&sorted),
            data_quality: quality,
            sample_count: kb.stats.count(),
        });
        self.contexts.write().insert(*key, ctx);
    }
}

fn day_of_ms(ts_ms: u64) -> NaiveDate {
    DateTime::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}
