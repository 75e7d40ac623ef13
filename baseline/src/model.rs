use chrono::NaiveDate;
use corelib::types::StrikeKey;

use crate::stats::{RunningStats, percentile};

/// Floor for the z-score denominator so a flat baseline cannot divide by
/// zero or explode the score.
pub const Z_EPSILON: f64 = 1e-6;

/// Data quality assigned to a key the store has never seen. Non-zero so the
/// default is "valid but penalized" rather than an error, small enough that
/// a strict quality gate suppresses it.
pub const NO_HISTORY_QUALITY: f64 = 0.25;

/// Multiplier applied to quality while the store runs memory-only because
/// persistence is unreachable.
pub const DEGRADED_QUALITY_FACTOR: f64 = 0.5;

/// Percentile ladder over recent pressure ratios. Values are non-decreasing
/// by construction (computed from one sorted sample).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileLadder {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl PercentileLadder {
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p10: percentile(sorted, 0.10),
            p25: percentile(sorted, 0.25),
            p50: percentile(sorted, 0.50),
            p75: percentile(sorted, 0.75),
            p90: percentile(sorted, 0.90),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
        }
    }

    pub fn as_array(&self) -> [f64; 7] {
        [self.p10, self.p25, self.p50, self.p75, self.p90, self.p95, self.p99]
    }
}

impl Default for PercentileLadder {
    fn default() -> Self {
        Self::from_sorted(&[])
    }
}

/// Read-only statistical summary of one key's trailing history.
///
/// Published whole via `Arc` swap; the scoring path only ever sees a
/// complete snapshot, never a half-updated one.
#[derive(Debug, Clone)]
pub struct BaselineContext {
    pub key: StrikeKey,
    pub mean: f64,
    pub std_dev: f64,
    pub percentiles: PercentileLadder,
    /// Fraction of expected windows actually observed, scaled down while
    /// the store is degraded.
    pub data_quality: f64,
    pub sample_count: u64,
}

impl BaselineContext {
    /// Stale-but-valid default served when no history exists for `key`.
    /// Mean 1.0 is the neutral pressure ratio (balanced flow).
    pub fn default_for(key: StrikeKey) -> Self {
        Self {
            key,
            mean: 1.0,
            std_dev: 0.5,
            percentiles: PercentileLadder::default(),
            data_quality: NO_HISTORY_QUALITY,
            sample_count: 0,
        }
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev.max(Z_EPSILON)
    }
}

/// Per-day aggregate persisted by the repository, keyed (strike, side, day).
/// Count/mean/m2 are the Welford components, sufficient to rebuild the
/// rolling statistic by merging days inside the lookback horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct DayStats {
    pub key: StrikeKey,
    pub day: NaiveDate,
    pub count: u64,
    pub mean: f64,
    pub m2: f64,
}

impl DayStats {
    pub fn from_stats(key: StrikeKey, day: NaiveDate, stats: &RunningStats) -> Self {
        Self {
            key,
            day,
            count: stats.count(),
            mean: stats.mean(),
            m2: stats.m2(),
        }
    }

    pub fn to_stats(&self) -> RunningStats {
        RunningStats::from_parts(self.count, self.mean, self.m2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::types::OptionSide;

    #[test]
    fn ladder_is_non_decreasing() {
        let sorted = [0.2, 0.5, 0.9, 1.1, 1.4, 2.0, 2.1, 3.5, 4.0, 9.0];
        let ladder = PercentileLadder::from_sorted(&sorted);
        let arr = ladder.as_array();
        for pair in arr.windows(2) {
            assert!(pair[0] <= pair[1], "ladder must be non-decreasing: {arr:?}");
        }
    }

    #[test]
    fn z_score_uses_epsilon_floor_on_flat_baseline() {
        let mut ctx = BaselineContext::default_for(StrikeKey::new(10_000, OptionSide::Call));
        ctx.std_dev = 0.0;
        let z = ctx.z_score(1.1);
        assert!(z.is_finite());
        assert!(z > 0.0);
    }

    #[test]
    fn default_context_is_penalized_but_valid() {
        let ctx = BaselineContext::default_for(StrikeKey::new(10_000, OptionSide::Put));
        assert_eq!(ctx.sample_count, 0);
        assert!(ctx.data_quality > 0.0);
        assert!(ctx.data_quality < 0.5);
    }

    #[test]
    fn day_stats_round_trip_through_parts() {
        let mut stats = RunningStats::new();
        for v in [1.0, 2.0, 4.0] {
            stats.push(v);
        }
        let key = StrikeKey::new(10_000, OptionSide::Call);
        let day = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let row = DayStats::from_stats(key, day, &stats);
        let rebuilt = row.to_stats();
        assert_eq!(rebuilt, stats);
    }
}
