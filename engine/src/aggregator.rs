//! Streaming per-key pressure aggregation.
//!
//! Folds order events into fixed-length buckets per (strike, side) key.
//! Windows close lazily: the first event whose timestamp crosses a key's
//! bucket boundary returns that key's previous window. No global clock
//! tick, so a quiet instrument just holds its window until it speaks again
//! or gets evicted. This component does no I/O.

use std::collections::HashMap;

use tracing::{debug, trace};

use corelib::types::{InitiatorSide, OrderEvent, PressureWindow, StrikeKey};

struct OpenWindow {
    start_ms: u64,
    end_ms: u64,
    bid_volume: u64,
    ask_volume: u64,
    trade_count: u64,
    dropped_events: u64,
    first_price: f64,
    last_price: f64,
    last_event_ms: u64,
}

impl OpenWindow {
    fn new(start_ms: u64, window_ms: u64, event: &OrderEvent) -> Self {
        let mut w = Self {
            start_ms,
            end_ms: start_ms + window_ms,
            bid_volume: 0,
            ask_volume: 0,
            trade_count: 0,
            dropped_events: 0,
            first_price: event.price,
            last_price: event.price,
            last_event_ms: event.ts_ms,
        };
        w.fold(event);
        w
    }

    fn fold(&mut self, event: &OrderEvent) {
        match event.initiator {
            InitiatorSide::Bid => self.bid_volume += event.size,
            InitiatorSide::Ask => self.ask_volume += event.size,
            // mid-spread executions carry no directional volume
            InitiatorSide::Neither => {}
        }
        self.trade_count += 1;
        self.last_price = event.price;
        self.last_event_ms = event.ts_ms;
    }

    fn close(self, key: StrikeKey) -> PressureWindow {
        PressureWindow {
            key,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            bid_volume: self.bid_volume,
            ask_volume: self.ask_volume,
            trade_count: self.trade_count,
            dropped_events: self.dropped_events,
            first_price: self.first_price,
            last_price: self.last_price,
        }
    }
}

pub struct PressureAggregator {
    window_ms: u64,
    idle_eviction_ms: u64,
    open: HashMap<StrikeKey, OpenWindow>,
}

impl PressureAggregator {
    pub fn new(window_ms: u64, idle_eviction_ms: u64) -> Self {
        Self {
            window_ms,
            idle_eviction_ms,
            open: HashMap::new(),
        }
    }

    /// Accumulates `event` into its key's open window. Returns the previous
    /// window once the event's timestamp has advanced past that key's
    /// bucket boundary.
    ///
    /// Out-of-order events (earlier than the open window's start) are
    /// dropped and counted toward data completeness; they never produce
    /// negative volume or a panic.
    pub fn ingest(&mut self, event: &OrderEvent) -> Option<PressureWindow> {
        let bucket_start = event.ts_ms / self.window_ms * self.window_ms;

        match self.open.remove(&event.key) {
            None => {
                self.open
                    .insert(event.key, OpenWindow::new(bucket_start, self.window_ms, event));
                None
            }
            Some(mut current) => {
                if event.ts_ms < current.start_ms {
                    current.dropped_events += 1;
                    trace!(
                        target: "aggregator",
                        key = %event.key,
                        ts_ms = event.ts_ms,
                        window_start = current.start_ms,
                        "dropped out-of-order event"
                    );
                    self.open.insert(event.key, current);
                    return None;
                }
                if event.ts_ms >= current.end_ms {
                    let closed = current.close(event.key);
                    self.open
                        .insert(event.key, OpenWindow::new(bucket_start, self.window_ms, event));
                    return Some(closed);
                }
                current.fold(event);
                self.open.insert(event.key, current);
                None
            }
        }
    }

    /// Evicts keys whose last event is older than the idle timeout,
    /// bounding memory when instruments go quiet. Their partial windows are
    /// discarded, not closed: a window that never saw its boundary has no
    /// complete bucket to report.
    pub fn evict_idle(&mut self, now_ms: u64) -> usize {
        let timeout = self.idle_eviction_ms;
        let before = self.open.len();
        self.open
            .retain(|_, w| now_ms.saturating_sub(w.last_event_ms) <= timeout);
        let evicted = before - self.open.len();
        if evicted > 0 {
            debug!(target: "aggregator", evicted, remaining = self.open.len(), "idle keys evicted");
        }
        evicted
    }

    pub fn open_keys(&self) -> usize {
        self.open.len()
    }
}
