//! Offline A/B comparison shell.
//!
//! Runs the full engine and the raw-threshold reference over the same
//! batch and records agreement, direction, confidence delta, and wall-clock
//! latency for each side. Read-only with respect to the comparison: results
//! never feed back into either algorithm's state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use baseline::BaselineStore;
use common::logger::{BatchId, child_span, root_span};
use corelib::config::{ConfigError, EngineConfig};
use corelib::types::{DominantSide, PressureWindow, Signal, StrikeKey};

use crate::algorithm::{ReferenceAlgorithm, SignalAlgorithm};
use crate::signal_engine::SignalEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    Both,
    EngineOnly,
    ReferenceOnly,
    Neither,
}

#[derive(Debug)]
pub struct ComparisonResult {
    pub engine_signals: Vec<Signal>,
    pub reference_signals: Vec<Signal>,
    pub agreement: Agreement,
    /// Whether every key emitted by both sides agrees on direction.
    /// `None` when no key was emitted by both.
    pub direction_agreement: Option<bool>,
    /// Mean (engine − reference) confidence over keys emitted by both.
    pub confidence_delta: Option<f64>,
    pub engine_elapsed: Duration,
    pub reference_elapsed: Duration,
}

pub struct ComparisonHarness {
    engine: SignalEngine,
    reference: ReferenceAlgorithm,
}

impl ComparisonHarness {
    pub fn new(cfg: EngineConfig, store: Arc<BaselineStore>) -> Result<Self, ConfigError> {
        let engine = SignalEngine::new(cfg.clone(), store)?;
        Ok(Self {
            engine,
            reference: ReferenceAlgorithm::new(cfg),
        })
    }

    pub fn compare_once(&mut self, batch: &[PressureWindow]) -> ComparisonResult {
        let batch_id = BatchId::default();
        let span = root_span("comparison", &batch_id);
        let _root = span.enter();

        let engine_start = Instant::now();
        let engine_signals = {
            let _stage = child_span("engine").entered();
            self.engine.evaluate(batch)
        };
        let engine_elapsed = engine_start.elapsed();

        let reference_start = Instant::now();
        let reference_signals = {
            let _stage = child_span("reference").entered();
            self.reference.evaluate(batch)
        };
        let reference_elapsed = reference_start.elapsed();

        let agreement = match (engine_signals.is_empty(), reference_signals.is_empty()) {
            (false, false) => Agreement::Both,
            (false, true) => Agreement::EngineOnly,
            (true, false) => Agreement::ReferenceOnly,
            (true, true) => Agreement::Neither,
        };

        let (direction_agreement, confidence_delta) =
            shared_key_stats(&engine_signals, &reference_signals);

        info!(
            target: "harness",
            engine = self.engine.name(),
            reference = self.reference.name(),
            ?agreement,
            engine_signals = engine_signals.len(),
            reference_signals = reference_signals.len(),
            engine_us = engine_elapsed.as_micros() as u64,
            reference_us = reference_elapsed.as_micros() as u64,
            "comparison complete"
        );

        ComparisonResult {
            engine_signals,
            reference_signals,
            agreement,
            direction_agreement,
            confidence_delta,
            engine_elapsed,
            reference_elapsed,
        }
    }
}

fn shared_key_stats(
    engine: &[Signal],
    reference: &[Signal],
) -> (Option<bool>, Option<f64>) {
    let by_key: HashMap<StrikeKey, (DominantSide, f64)> = reference
        .iter()
        .map(|s| (s.key, (s.dominant_side, s.confidence)))
        .collect();

    let mut shared = 0usize;
    let mut directions_agree = true;
    let mut delta_sum = 0.0;
    for signal in engine {
        if let Some((dir, confidence)) = by_key.get(&signal.key) {
            shared += 1;
            directions_agree &= *dir == signal.dominant_side;
            delta_sum += signal.confidence - confidence;
        }
    }

    if shared == 0 {
        (None, None)
    } else {
        (Some(directions_agree), Some(delta_sum / shared as f64))
    }
}
