//! Strike-sorted index over one evaluation batch.
//!
//! Cross-strike checks (coordination bonus, straddle matching) need "all
//! windows within R strikes of K" for every key in the batch. A naive scan
//! is O(n) per lookup and O(n²) per batch, which silently degrades latency
//! as the instrument universe grows. This index sorts once per batch
//! (O(n log n)) and answers each lookup with two binary searches plus a
//! scan of the matching slice only (O(log n + k)).
//!
//! Ephemeral by design: rebuilt for every batch, never persisted, read-only
//! during scoring.

use corelib::types::{PressureWindow, StrikeKey};

pub struct CoordinationIndex<'a> {
    windows: &'a [PressureWindow],
    /// (strike_cents, index into `windows`), sorted by strike.
    order: Vec<(i64, usize)>,
}

impl<'a> CoordinationIndex<'a> {
    /// Builds the index for one batch. O(n log n).
    pub fn build(windows: &'a [PressureWindow]) -> Self {
        let mut order: Vec<(i64, usize)> =
            windows.iter().enumerate().map(|(i, w)| (w.key.strike_cents, i)).collect();
        order.sort_unstable_by_key(|(strike, _)| *strike);
        Self { windows, order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All windows whose strike lies within `radius_cents` of
    /// `strike_cents`, inclusive. O(log n) to locate the slice, O(k) to
    /// walk it.
    pub fn nearby(
        &self,
        strike_cents: i64,
        radius_cents: i64,
    ) -> impl Iterator<Item = &'a PressureWindow> + '_ {
        let (lo, hi) = self.bounds(strike_cents, radius_cents);
        self.order[lo..hi].iter().map(|(_, i)| &self.windows[*i])
    }

    /// The window for an exact key in this batch, if present. Strikes with
    /// both legs in the batch sit adjacent in the order, so the slice
    /// walked here has at most two entries per strike.
    pub fn find_key(&self, key: &StrikeKey) -> Option<&'a PressureWindow> {
        let (lo, hi) = self.bounds(key.strike_cents, 0);
        self.order[lo..hi]
            .iter()
            .map(|(_, i)| &self.windows[*i])
            .find(|w| w.key == *key)
    }

    /// Half-open range of the sorted order covered by a lookup. Exposed so
    /// tests can assert the scan is bounded by the match count, not n.
    pub fn bounds(&self, strike_cents: i64, radius_cents: i64) -> (usize, usize) {
        let min = strike_cents.saturating_sub(radius_cents);
        let max = strike_cents.saturating_add(radius_cents);
        let lo = self.order.partition_point(|(s, _)| *s < min);
        let hi = lo + self.order[lo..].partition_point(|(s, _)| *s <= max);
        (lo, hi)
    }
}
