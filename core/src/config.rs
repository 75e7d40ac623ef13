use serde::Deserialize;
use thiserror::Error;

/// Raised for invalid thresholds or weights at construction time.
///
/// Invalid configuration is the one fatal error class in the system: the
/// engine refuses to construct rather than score with undefined behavior.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window length must be positive")]
    ZeroWindow,

    #[error("baseline lookback must cover at least one day")]
    ZeroLookback,

    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("coordination radius must be non-negative, got {0}")]
    NegativeRadius(i64),

    #[error("pressure and deviation weights sum to {0}, must not exceed 1.0")]
    WeightSumExceeded(f64),

    #[error("strength cutoffs must be non-increasing from extreme to moderate")]
    CutoffOrder,
}

/// Weights for the confidence combination. Pressure and deviation are the
/// positive contributions, the market-making term is a penalty, and the
/// coordination bonus is a bounded additive reward for sweep patterns.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScorerWeights {
    pub pressure: f64,
    pub deviation: f64,
    pub market_making_penalty: f64,
    pub coordination_bonus: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            pressure: 0.45,
            deviation: 0.55,
            market_making_penalty: 0.50,
            coordination_bonus: 0.15,
        }
    }
}

/// Confidence cutoffs for the discrete strength classes. A confidence equal
/// to a cutoff resolves to the class below it (conservative tie-break).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StrengthCutoffs {
    pub extreme: f64,
    pub very_high: f64,
    pub high: f64,
    pub moderate: f64,
}

impl Default for StrengthCutoffs {
    fn default() -> Self {
        Self {
            extreme: 0.65,
            very_high: 0.55,
            high: 0.45,
            moderate: 0.30,
        }
    }
}

/// Sub-thresholds for the market-making detector.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MarketMakingConfig {
    /// Maximum start-time offset between the two legs of a straddle for
    /// them to count as coordinated.
    pub straddle_offset_ms: u64,
    /// Price decline (fraction of open) on both legs that marks a
    /// volatility-crush window.
    pub crush_decline: f64,
    /// Weight of the straddle sub-probability in the combined score.
    pub straddle_weight: f64,
    /// Weight of the crush sub-probability in the combined score.
    pub crush_weight: f64,
}

impl Default for MarketMakingConfig {
    fn default() -> Self {
        Self {
            straddle_offset_ms: 180_000,
            crush_decline: 0.02,
            straddle_weight: 0.65,
            crush_weight: 0.35,
        }
    }
}

/// Immutable engine configuration, supplied whole at construction.
///
/// Thresholds and weights are deployment inputs, not constants of the
/// design; defaults here are starting points, not tuned values.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Fixed bucket length for pressure windows.
    pub window_ms: u64,

    /// Keys with no events for this long get their open slot evicted.
    pub idle_eviction_ms: u64,

    /// Trailing horizon of the statistical baseline.
    pub baseline_lookback_days: u32,

    /// Expected closed windows per trading day, used for the data-quality
    /// fraction (observed / expected).
    pub expected_windows_per_day: u32,

    // =========================
    // Hard gates
    // =========================
    /// Minimum pressure ratio before a window is even considered.
    pub min_pressure_ratio: f64,
    /// Minimum total volume (contracts) per window.
    pub min_volume: u64,
    /// Minimum baseline data-quality fraction.
    pub min_data_quality: f64,

    // =========================
    // Scoring
    // =========================
    pub weights: ScorerWeights,
    pub cutoffs: StrengthCutoffs,
    /// Z-score at which the deviation transform is ~63% saturated.
    pub z_saturation: f64,
    pub market_making: MarketMakingConfig,

    // =========================
    // Coordination
    // =========================
    /// Strike distance (cents) considered "nearby" for cross-strike checks.
    pub coordination_radius_cents: i64,
    /// Maximum window start-time offset for two strikes to count as
    /// simultaneous.
    pub coordination_offset_ms: u64,
    /// Pressure ratio a nearby strike must show to count as elevated.
    pub coordination_min_ratio: f64,

    // =========================
    // Engine state bounds
    // =========================
    /// Age bound on the recent-window ring consumed by the detector.
    pub history_retention_ms: u64,
    /// Capacity of the fire-and-forget baseline record queue.
    pub record_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_ms: 300_000,
            idle_eviction_ms: 1_800_000,
            baseline_lookback_days: 20,
            expected_windows_per_day: 78,
            min_pressure_ratio: 2.0,
            min_volume: 500,
            min_data_quality: 0.6,
            weights: ScorerWeights::default(),
            cutoffs: StrengthCutoffs::default(),
            z_saturation: 4.0,
            market_making: MarketMakingConfig::default(),
            coordination_radius_cents: 1_000,
            coordination_offset_ms: 300_000,
            coordination_min_ratio: 1.5,
            history_retention_ms: 3_600_000,
            record_queue_capacity: 1_024,
        }
    }
}

impl EngineConfig {
    /// Validates thresholds and weights. Called by the engine constructor;
    /// failure here is fatal by design.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.baseline_lookback_days == 0 {
            return Err(ConfigError::ZeroLookback);
        }
        if self.coordination_radius_cents < 0 {
            return Err(ConfigError::NegativeRadius(self.coordination_radius_cents));
        }

        check_unit("min_data_quality", self.min_data_quality)?;
        check_non_negative("min_pressure_ratio", self.min_pressure_ratio)?;
        check_non_negative("coordination_min_ratio", self.coordination_min_ratio)?;
        check_non_negative("z_saturation", self.z_saturation)?;

        let w = &self.weights;
        check_unit("weights.pressure", w.pressure)?;
        check_unit("weights.deviation", w.deviation)?;
        check_unit("weights.market_making_penalty", w.market_making_penalty)?;
        check_unit("weights.coordination_bonus", w.coordination_bonus)?;
        let positive_sum = w.pressure + w.deviation;
        if positive_sum > 1.0 + 1e-9 {
            return Err(ConfigError::WeightSumExceeded(positive_sum));
        }

        let c = &self.cutoffs;
        for (name, v) in [
            ("cutoffs.extreme", c.extreme),
            ("cutoffs.very_high", c.very_high),
            ("cutoffs.high", c.high),
            ("cutoffs.moderate", c.moderate),
        ] {
            check_unit(name, v)?;
        }
        if !(c.extreme >= c.very_high && c.very_high >= c.high && c.high >= c.moderate) {
            return Err(ConfigError::CutoffOrder);
        }

        let mm = &self.market_making;
        check_unit("market_making.crush_decline", mm.crush_decline)?;
        check_unit("market_making.straddle_weight", mm.straddle_weight)?;
        check_unit("market_making.crush_weight", mm.crush_weight)?;

        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::OutOfUnitRange { name, value });
    }
    Ok(())
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value < 0.0 || value.is_nan() {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}
