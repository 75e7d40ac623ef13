//! Pipeline orchestrator.
//!
//! `evaluate` drives the per-key state machine
//! IDLE → WINDOW_OPEN → WINDOW_CLOSED → SCORED → (EMITTED | SUPPRESSED)
//! over one batch of closed windows: baseline fetch, coordination index
//! build, market-making assessment, confidence scoring, hard gates.
//!
//! Containment contract: a failure while scoring one key suppresses that
//! key only. `evaluate` itself never fails; the sole fatal error in the
//! system is invalid configuration at construction.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use baseline::BaselineStore;
use common::logger::BatchId;
use corelib::config::{ConfigError, EngineConfig};
use corelib::types::{
    PressureWindow, RecommendedAction, Signal, SignalStrength, StrikeKey,
};

use crate::coordination::CoordinationIndex;
use crate::errors::EngineError;
use crate::market_making;
use crate::scorer;

/// Per-key pipeline state, updated as `evaluate` walks a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Idle,
    WindowOpen,
    WindowClosed,
    Scored,
    Emitted,
    Suppressed,
}

/// Why a key emitted nothing this batch. Surfaced through logging for
/// operators; callers see only the absence of a `Signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    PressureBelowMin,
    VolumeBelowMin,
    DataQualityBelowMin,
    ConfidenceBelowCutoff,
    EvaluationError,
}

enum WindowOutcome {
    Emitted(Signal),
    Suppressed(SuppressReason),
}

pub struct SignalEngine {
    cfg: EngineConfig,
    baseline: Arc<BaselineStore>,
    /// Recent closed windows consumed by the market-making detector.
    /// Time-bounded ring; pruned against each batch's newest window.
    history: VecDeque<PressureWindow>,
    key_states: HashMap<StrikeKey, KeyState>,
}

impl SignalEngine {
    /// Validates the configuration and constructs the engine. Invalid
    /// weights or thresholds refuse construction outright.
    pub fn new(cfg: EngineConfig, baseline: Arc<BaselineStore>) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            baseline,
            history: VecDeque::new(),
            key_states: HashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Marks a key's window as open. Optional bookkeeping for callers that
    /// drive the aggregator themselves and want full state visibility.
    pub fn note_window_open(&mut self, key: StrikeKey) {
        self.key_states.insert(key, KeyState::WindowOpen);
    }

    pub fn key_state(&self, key: &StrikeKey) -> KeyState {
        self.key_states.get(key).copied().unwrap_or_default()
    }

    /// Evaluates one batch of closed windows and returns at most one signal
    /// per key. Never fails; per-key problems log and suppress that key.
    #[instrument(skip(self, batch), fields(batch_id = %BatchId::default(), windows = batch.len()))]
    pub fn evaluate(&mut self, batch: &[PressureWindow]) -> Vec<Signal> {
        let index = CoordinationIndex::build(batch);
        let mut signals = Vec::new();
        let mut archive: Vec<PressureWindow> = Vec::with_capacity(batch.len());

        {
            self.history.make_contiguous();
            let (history, _) = self.history.as_slices();

            for window in batch {
                self.key_states.insert(window.key, KeyState::WindowClosed);

                let result = evaluate_window(
                    &self.cfg,
                    &self.baseline,
                    history,
                    window,
                    &index,
                );

                match result {
                    Ok(outcome) => {
                        self.key_states.insert(window.key, KeyState::Scored);
                        archive.push(window.clone());
                        match outcome {
                            WindowOutcome::Emitted(signal) => {
                                self.key_states.insert(window.key, KeyState::Emitted);
                                signals.push(signal);
                            }
                            WindowOutcome::Suppressed(reason) => {
                                self.key_states.insert(window.key, KeyState::Suppressed);
                                debug!(
                                    target: "signal_engine",
                                    key = %window.key,
                                    ?reason,
                                    data_quality = scorer::data_quality(
                                        window,
                                        &self.baseline.get(&window.key),
                                    ),
                                    "window suppressed"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        // one bad key must never abort the batch
                        self.key_states.insert(window.key, KeyState::Suppressed);
                        warn!(
                            target: "signal_engine",
                            key = %window.key,
                            error = %e,
                            "key suppressed for this batch"
                        );
                    }
                }
            }
        }

        // archive structurally valid windows: baseline statistics describe
        // all flow, not just the flow that produced signals
        let mut max_end = 0u64;
        for window in archive {
            max_end = max_end.max(window.end_ms);
            self.baseline.record(window.clone());
            self.history.push_back(window);
        }
        self.prune_history(max_end);

        signals
    }

    fn prune_history(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.cfg.history_retention_ms);
        while let Some(front) = self.history.front() {
            if front.end_ms < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}

fn evaluate_window(
    cfg: &EngineConfig,
    baseline: &BaselineStore,
    history: &[PressureWindow],
    window: &PressureWindow,
    index: &CoordinationIndex<'_>,
) -> Result<WindowOutcome, EngineError> {
    validate_window(window)?;

    let context = baseline.get(&window.key);

    // hard gates run before any scoring; failure is silence, not an error
    if scorer::effective_ratio(window) < cfg.min_pressure_ratio {
        return Ok(WindowOutcome::Suppressed(SuppressReason::PressureBelowMin));
    }
    if window.total_volume() < cfg.min_volume {
        return Ok(WindowOutcome::Suppressed(SuppressReason::VolumeBelowMin));
    }
    if scorer::data_quality(window, &context) < cfg.min_data_quality {
        return Ok(WindowOutcome::Suppressed(SuppressReason::DataQualityBelowMin));
    }

    let assessment = market_making::assess(
        window,
        history,
        index,
        cfg.market_making.straddle_offset_ms,
        &cfg.market_making,
    );
    let coordination = coordination_fraction(window, index, cfg);
    let outcome = scorer::score(window, &context, &assessment, coordination, cfg);

    if outcome.strength == SignalStrength::None {
        return Ok(WindowOutcome::Suppressed(SuppressReason::ConfidenceBelowCutoff));
    }

    Ok(WindowOutcome::Emitted(Signal {
        key: window.key,
        ts_ms: window.end_ms,
        dominant_side: window.dominant_side(),
        pressure_ratio: window.pressure_ratio(),
        z_score: outcome.z_score,
        market_making_score: assessment.score,
        confidence: outcome.confidence,
        strength: outcome.strength,
        action: RecommendedAction::for_strength(outcome.strength),
    }))
}

fn validate_window(window: &PressureWindow) -> Result<(), EngineError> {
    if window.end_ms <= window.start_ms {
        return Err(EngineError::ComputationFailure {
            key: window.key,
            detail: format!(
                "window ends before it starts ({}..{})",
                window.start_ms, window.end_ms
            ),
        });
    }
    if !window.first_price.is_finite() || !window.last_price.is_finite() {
        return Err(EngineError::ComputationFailure {
            key: window.key,
            detail: "non-finite price in window".to_string(),
        });
    }
    if window.trade_count == 0 && window.total_volume() > 0 {
        return Err(EngineError::ComputationFailure {
            key: window.key,
            detail: "volume without trades".to_string(),
        });
    }
    Ok(())
}

/// Fraction of the coordination bonus earned: counts distinct nearby
/// strikes showing elevated same-direction pressure in the same batch
/// window. Same-strike windows are the straddle detector's business and do
/// not count toward a sweep.
fn coordination_fraction(
    window: &PressureWindow,
    index: &CoordinationIndex<'_>,
    cfg: &EngineConfig,
) -> f64 {
    let mut coordinated = 0u32;
    for other in index.nearby(window.key.strike_cents, cfg.coordination_radius_cents) {
        if other.key.strike_cents == window.key.strike_cents {
            continue;
        }
        if other.dominant_side() != window.dominant_side() {
            continue;
        }
        if scorer::effective_ratio(other) < cfg.coordination_min_ratio {
            continue;
        }
        if other.start_ms.abs_diff(window.start_ms) > cfg.coordination_offset_ms {
            continue;
        }
        coordinated += 1;
    }
    (f64::from(coordinated) / 3.0).min(1.0)
}
