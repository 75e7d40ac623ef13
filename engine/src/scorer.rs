//! Multi-factor confidence scoring.
//!
//! confidence = w1·pressure + w2·deviation − w3·mm + w4·coordination,
//! clamped to [0,1]. Both positive factors pass through saturating
//! transforms (tanh) so an extreme outlier in one dimension cannot swamp
//! the rest; the market-making term is a straight penalty; the coordination
//! bonus rewards genuine multi-strike sweeps.
//!
//! Hard gates run before scoring. If `score` is reached with ungated input
//! anyway, the volume and data-quality guards inside classification force
//! class `None`.

use corelib::config::EngineConfig;
use corelib::types::{PressureWindow, SignalStrength};

use baseline::BaselineContext;

use crate::market_making::MarketMakingAssessment;

#[derive(Debug, Clone, Copy)]
pub struct ScoreOutcome {
    pub confidence: f64,
    pub strength: SignalStrength,
    pub z_score: f64,
}

/// Pressure magnitude regardless of direction: ask-dominance and
/// bid-dominance are both anomalies, mirrored through 1/ratio.
pub fn effective_ratio(window: &PressureWindow) -> f64 {
    let ratio = window.pressure_ratio();
    if ratio >= 1.0 {
        ratio
    } else if ratio > 0.0 {
        1.0 / ratio
    } else {
        // zero ask volume: fully bid-dominant, mirror the floored ratio
        window.bid_volume.max(1) as f64
    }
}

/// Normalized distance of the pressure ratio above the minimum-interest
/// threshold. Zero at the threshold, saturating toward 1.
fn pressure_significance(window: &PressureWindow, cfg: &EngineConfig) -> f64 {
    let min = cfg.min_pressure_ratio.max(1.0);
    ((effective_ratio(window) / min) - 1.0).max(0.0).tanh()
}

/// Saturating transform of the baseline z-score; |z| because deviation in
/// either direction is anomalous.
fn baseline_deviation(z_score: f64, cfg: &EngineConfig) -> f64 {
    (z_score.abs() / cfg.z_saturation.max(f64::EPSILON)).tanh()
}

/// Scores a gated window. `coordination_fraction` in [0,1] is the portion
/// of the coordination bonus earned (0 when no same-direction neighbors).
pub fn score(
    window: &PressureWindow,
    context: &BaselineContext,
    assessment: &MarketMakingAssessment,
    coordination_fraction: f64,
    cfg: &EngineConfig,
) -> ScoreOutcome {
    let w = &cfg.weights;
    let z_score = context.z_score(window.pressure_ratio());

    let confidence = (w.pressure * pressure_significance(window, cfg)
        + w.deviation * baseline_deviation(z_score, cfg)
        - w.market_making_penalty * assessment.score
        + w.coordination_bonus * coordination_fraction.clamp(0.0, 1.0))
    .clamp(0.0, 1.0);

    ScoreOutcome {
        confidence,
        strength: classify(confidence, window, context, cfg),
        z_score,
    }
}

/// Buckets confidence into the discrete strength classes. Ties resolve to
/// the lower class; the volume and data-quality guards short-circuit to
/// `None` so an ungated call can never produce a classified signal.
pub fn classify(
    confidence: f64,
    window: &PressureWindow,
    context: &BaselineContext,
    cfg: &EngineConfig,
) -> SignalStrength {
    if window.total_volume() < cfg.min_volume {
        return SignalStrength::None;
    }
    if data_quality(window, context) < cfg.min_data_quality {
        return SignalStrength::None;
    }

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

/// Combined data quality of one evaluation: the weaker of the baseline's
/// history coverage and the window's own event completeness.
pub fn data_quality(window: &PressureWindow, context: &BaselineContext) -> f64 {
    context.data_quality.min(window.completeness())
}
