//! Market-making pattern detection.
//!
//! Estimates the probability that a window's flow is delta-neutral
//! market-making rather than directional positioning, from two signatures:
//!
//! - **Straddle coordination**: a matching opposite-side window at the same
//!   strike, opened within a short offset, with comparable volume. Dealers
//!   quoting both legs produce this; directional buyers do not.
//! - **Volatility crush**: simultaneous price decline on both the call and
//!   put side of a strike — implied-volatility collapse, not conviction.
//!
//! Pure with respect to its inputs: no hidden state, deterministic for any
//! synthetic history a test feeds in.

use corelib::config::MarketMakingConfig;
use corelib::types::{OptionSide, PressureWindow};

use crate::coordination::CoordinationIndex;

#[derive(Debug, Clone, Default)]
pub struct MarketMakingAssessment {
    /// Probability [0,1] that this window is one leg of a quoted straddle.
    pub straddle_probability: f64,
    /// Both legs of the strike declined past the configured threshold.
    pub crush_detected: bool,
    pub crush_probability: f64,
    /// Weighted combination of the two, clamped to [0,1].
    pub score: f64,
}

/// Assess one window against its batch and recent history.
pub fn assess(
    window: &PressureWindow,
    recent_history: &[PressureWindow],
    index: &CoordinationIndex<'_>,
    straddle_offset_ms: u64,
    cfg: &MarketMakingConfig,
) -> MarketMakingAssessment {
    let straddle_probability =
        straddle_coordination(window, recent_history, index, straddle_offset_ms);
    let (crush_detected, crush_probability) =
        volatility_crush(window, recent_history, index, cfg.crush_decline);

    let score = (cfg.straddle_weight * straddle_probability
        + cfg.crush_weight * crush_probability)
        .clamp(0.0, 1.0);

    MarketMakingAssessment {
        straddle_probability,
        crush_detected,
        crush_probability,
        score,
    }
}

/// Highest coordination probability over all opposite-leg candidates in the
/// batch and the recent history. Scales with volume balance and temporal
/// proximity; zero when no candidate sits inside the time offset.
fn straddle_coordination(
    window: &PressureWindow,
    recent_history: &[PressureWindow],
    index: &CoordinationIndex<'_>,
    offset_ms: u64,
) -> f64 {
    let opposite = window.key.opposite_leg();

    let batch_candidate = index.find_key(&opposite);
    let history_candidates = recent_history.iter().filter(|w| w.key == opposite);

    batch_candidate
        .into_iter()
        .chain(history_candidates)
        .map(|candidate| leg_coordination(window, candidate, offset_ms))
        .fold(0.0, f64::max)
}

fn leg_coordination(window: &PressureWindow, candidate: &PressureWindow, offset_ms: u64) -> f64 {
    let offset = window.start_ms.abs_diff(candidate.start_ms);
    if offset > offset_ms {
        return 0.0;
    }
    let v_self = window.total_volume();
    let v_other = candidate.total_volume();
    if v_self == 0 || v_other == 0 {
        return 0.0;
    }
    let balance = v_self.min(v_other) as f64 / v_self.max(v_other) as f64;
    let proximity = 1.0 - offset as f64 / offset_ms.max(1) as f64;
    balance * proximity
}

/// Looks across the window, its batch, and recent history for price decline
/// on both legs of the strike. Severity is the weaker leg's decline over
/// the threshold; the flag trips when both legs cross it.
fn volatility_crush(
    window: &PressureWindow,
    recent_history: &[PressureWindow],
    index: &CoordinationIndex<'_>,
    crush_decline: f64,
) -> (bool, f64) {
    if crush_decline <= 0.0 {
        return (false, 0.0);
    }

    let strike = window.key.strike_cents;
    let mut call_decline: f64 = 0.0;
    let mut put_decline: f64 = 0.0;

    let same_strike = std::iter::once(window)
        .chain(index.nearby(strike, 0))
        .chain(recent_history.iter().filter(|w| w.key.strike_cents == strike));

    for w in same_strike {
        let decline = (-w.price_change()).max(0.0);
        match w.key.side {
            OptionSide::Call => call_decline = call_decline.max(decline),
            OptionSide::Put => put_decline = put_decline.max(decline),
        }
    }

    let severity = call_decline.min(put_decline) / crush_decline;
    let detected = severity >= 1.0;
    let probability = (severity / 2.0).min(1.0);
    (detected, probability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::types::StrikeKey;

    const OFFSET_MS: u64 = 180_000;

    fn cfg() -> MarketMakingConfig {
        MarketMakingConfig::default()
    }

    fn window_at(
        strike_cents: i64,
        side: OptionSide,
        start_ms: u64,
        volume: u64,
        first_price: f64,
        last_price: f64,
    ) -> PressureWindow {
        PressureWindow {
            key: StrikeKey::new(strike_cents, side),
            start_ms,
            end_ms: start_ms + 300_000,
            bid_volume: volume / 2,
            ask_volume: volume - volume / 2,
            trade_count: 10,
            dropped_events: 0,
            first_price,
            last_price,
        }
    }

    fn flat(strike_cents: i64, side: OptionSide, start_ms: u64, volume: u64) -> PressureWindow {
        window_at(strike_cents, side, start_ms, volume, 1.0, 1.0)
    }

    #[test]
    fn balanced_simultaneous_straddle_scores_high() {
        let call = flat(10_000, OptionSide::Call, 0, 1_000);
        let batch = vec![flat(10_000, OptionSide::Put, 0, 1_000)];
        let index = CoordinationIndex::build(&batch);

        let a = assess(&call, &[], &index, OFFSET_MS, &cfg());
        assert!((a.straddle_probability - 1.0).abs() < 1e-12);
        assert!(a.score > 0.5);
    }

    #[test]
    fn no_opposite_leg_means_no_straddle_signal() {
        let call = flat(10_000, OptionSide::Call, 0, 1_000);
        let batch = vec![flat(10_100, OptionSide::Call, 0, 1_000)];
        let index = CoordinationIndex::build(&batch);

        let a = assess(&call, &[], &index, OFFSET_MS, &cfg());
        assert_eq!(a.straddle_probability, 0.0);
    }

    #[test]
    fn straddle_probability_decays_with_time_offset() {
        let call = flat(10_000, OptionSide::Call, 0, 1_000);
        let near = vec![flat(10_000, OptionSide::Put, 30_000, 1_000)];
        let far = vec![flat(10_000, OptionSide::Put, 150_000, 1_000)];

        let near_p = assess(&call, &[], &CoordinationIndex::build(&near), OFFSET_MS, &cfg())
            .straddle_probability;
        let far_p = assess(&call, &[], &CoordinationIndex::build(&far), OFFSET_MS, &cfg())
            .straddle_probability;
        assert!(near_p > far_p);
        assert!(far_p > 0.0);
    }

    #[test]
    fn straddle_outside_offset_is_ignored() {
        let call = flat(10_000, OptionSide::Call, 0, 1_000);
        let history = vec![flat(10_000, OptionSide::Put, OFFSET_MS + 60_000, 1_000)];
        let index = CoordinationIndex::build(&[]);

        let a = assess(&call, &history, &index, OFFSET_MS, &cfg());
        assert_eq!(a.straddle_probability, 0.0);
    }

    #[test]
    fn straddle_probability_scales_with_volume_balance() {
        let call = flat(10_000, OptionSide::Call, 0, 1_000);
        let balanced = vec![flat(10_000, OptionSide::Put, 0, 1_000)];
        let lopsided = vec![flat(10_000, OptionSide::Put, 0, 100)];

        let b = assess(&call, &[], &CoordinationIndex::build(&balanced), OFFSET_MS, &cfg())
            .straddle_probability;
        let l = assess(&call, &[], &CoordinationIndex::build(&lopsided), OFFSET_MS, &cfg())
            .straddle_probability;
        assert!(b > l);
        assert!((l - 0.1).abs() < 1e-12);
    }

    #[test]
    fn history_candidate_counts_when_batch_has_no_leg() {
        let call = flat(10_000, OptionSide::Call, 300_000, 1_000);
        let history = vec![flat(10_000, OptionSide::Put, 240_000, 900)];
        let index = CoordinationIndex::build(&[]);

        let a = assess(&call, &history, &index, OFFSET_MS, &cfg());
        assert!(a.straddle_probability > 0.5);
    }

    #[test]
    fn crush_requires_decline_on_both_legs() {
        // call drops 5%, put flat: no crush
        let call = window_at(10_000, OptionSide::Call, 0, 1_000, 2.0, 1.9);
        let history = vec![flat(10_000, OptionSide::Put, 0, 1_000)];
        let index = CoordinationIndex::build(&[]);

        let a = assess(&call, &history, &index, OFFSET_MS, &cfg());
        assert!(!a.crush_detected);
        assert_eq!(a.crush_probability, 0.0);
    }

    #[test]
    fn simultaneous_two_sided_decline_flags_crush() {
        // both legs down 5% with a 2% threshold
        let call = window_at(10_000, OptionSide::Call, 0, 1_000, 2.0, 1.9);
        let history = vec![window_at(10_000, OptionSide::Put, 0, 1_000, 1.5, 1.425)];
        let index = CoordinationIndex::build(&[]);

        let a = assess(&call, &history, &index, OFFSET_MS, &cfg());
        assert!(a.crush_detected);
        assert!(a.crush_probability > 0.5);
    }

    #[test]
    fn combined_score_is_clamped_to_unit_interval() {
        let call = window_at(10_000, OptionSide::Call, 0, 1_000, 2.0, 1.0);
        let batch = vec![window_at(10_000, OptionSide::Put, 0, 1_000, 1.5, 0.75)];
        let index = CoordinationIndex::build(&batch);

        let a = assess(&call, &[], &index, OFFSET_MS, &cfg());
        assert!(a.score <= 1.0);
        assert!(a.score >= 0.0);
        assert!(a.crush_detected);
    }
}
