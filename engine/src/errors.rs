use corelib::types::StrikeKey;
use thiserror::Error;

/// Per-key failures inside the evaluation pipeline.
///
/// None of these escape `SignalEngine::evaluate`: each is caught at the
/// per-key boundary, logged, and suppresses only the key it belongs to.
/// The only fatal error class in the system is `corelib::config::ConfigError`
/// at construction time.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or insufficient data for a key; recovered by degrading
    /// quality and, past the gate threshold, suppressing emission.
    #[error("data gap for {key}: {detail}")]
    DataGap { key: StrikeKey, detail: String },

    /// Unexpected internal state during scoring, e.g. a malformed window.
    #[error("computation failure for {key}: {detail}")]
    ComputationFailure { key: StrikeKey, detail: String },

    /// Durable storage unreachable; the baseline store degrades to
    /// memory-only and scoring continues on a lower-quality baseline.
    #[error("baseline persistence unavailable")]
    Persistence,
}
