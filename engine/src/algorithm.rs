//! The closed set of signal algorithm variants.
//!
//! Variant selection happens once at construction, behind one trait, never
//! by string dispatch per call. Today the set is the full engine and the
//! raw-threshold reference used for A/B comparison.

use corelib::config::EngineConfig;
use corelib::types::{
    PressureWindow, RecommendedAction, Signal, SignalStrength,
};

use crate::scorer;
use crate::signal_engine::SignalEngine;

pub trait SignalAlgorithm {
    fn name(&self) -> &'static str;

    /// One batch in, zero or one signal per key out.
    fn evaluate(&mut self, batch: &[PressureWindow]) -> Vec<Signal>;
}

impl SignalAlgorithm for SignalEngine {
    fn name(&self) -> &'static str {
        "pressure-engine"
    }

    fn evaluate(&mut self, batch: &[PressureWindow]) -> Vec<Signal> {
        SignalEngine::evaluate(self, batch)
    }
}

/// Raw volume-ratio threshold with no baseline or market-making
/// adjustment. Exists as the comparison yardstick for the harness, not as
/// a production algorithm.
pub struct ReferenceAlgorithm {
    cfg: EngineConfig,
}

impl ReferenceAlgorithm {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }
}

impl SignalAlgorithm for ReferenceAlgorithm {
    fn name(&self) -> &'static str {
        "raw-threshold"
    }

    fn evaluate(&mut self, batch: &[PressureWindow]) -> Vec<Signal> {
        batch
            .iter()
            .filter_map(|window| {
                let ratio = scorer::effective_ratio(window);
                if ratio < self.cfg.min_pressure_ratio
                    || window.total_volume() < self.cfg.min_volume
                {
                    return None;
                }
                // crude confidence: how far past the threshold, capped
                let confidence = (ratio / (2.0 * self.cfg.min_pressure_ratio)).min(1.0);
                let strength = bucket(confidence, &self.cfg);
                if strength == SignalStrength::None {
                    return None;
                }
                Some(Signal {
                    key: window.key,
                    ts_ms: window.end_ms,
                    dominant_side: window.dominant_side(),
                    pressure_ratio: window.pressure_ratio(),
                    z_score: 0.0,
                    market_making_score: 0.0,
                    confidence,
                    strength,
                    action: RecommendedAction::for_strength(strength),
                })
            })
            .collect()
    }
}

fn bucket(confidence: f64, cfg: &EngineConfig) -> SignalStrength {
    let c = &cfg.cutoffs;
    if confidence > c.extreme {
        SignalStrength::Extreme
    } else if confidence > c.very_high {
        SignalStrength::VeryHigh
    } else if confidence > c.high {
        SignalStrength::High
    } else if confidence > c.moderate {
        SignalStrength::Moderate
    } else {
        SignalStrength::None
    }
}
