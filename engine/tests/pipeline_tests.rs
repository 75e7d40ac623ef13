//! End-to-end pipeline scenarios: aggregation through baseline lookup,
//! market-making assessment, scoring, and the comparison harness, with the
//! baseline fed through its real background updater.

mod mock_repository;

use std::sync::Arc;
use std::time::Duration;

use baseline::{BaselineStore, BaselineUpdater};
use corelib::config::EngineConfig;
use corelib::types::{
    DominantSide, InitiatorSide, OptionSide, OrderEvent, PressureWindow, SignalStrength,
    StrikeKey,
};
use engine::signal_engine::KeyState;
use engine::{Agreement, ComparisonHarness, PressureAggregator, SignalEngine};
use mock_repository::InMemoryBaselineRepository;

const WINDOW_MS: u64 = 300_000;
// 2026-08-21 00:00:00 UTC in ms
const DAY_START_MS: u64 = 1_787_270_400_000;
// first bucket after the seeded history
const BATCH_START_MS: u64 = DAY_START_MS + 10 * WINDOW_MS;

fn test_config() -> EngineConfig {
    EngineConfig {
        baseline_lookback_days: 1,
        expected_windows_per_day: 10,
        ..Default::default()
    }
}

fn call_key() -> StrikeKey {
    StrikeKey::new(10_000, OptionSide::Call)
}

fn window(key: StrikeKey, start_ms: u64, bid: u64, ask: u64) -> PressureWindow {
    PressureWindow {
        key,
        start_ms,
        end_ms: start_ms + WINDOW_MS,
        bid_volume: bid,
        ask_volume: ask,
        trade_count: 20,
        dropped_events: 0,
        first_price: 1.0,
        last_price: 1.0,
    }
}

/// A window with strong one-sided pressure: ratio 3.0, volume 4_000.
fn strong_window(key: StrikeKey, start_ms: u64) -> PressureWindow {
    window(key, start_ms, 1_000, 3_000)
}

/// Builds a store with ten unremarkable windows applied per key (ratios
/// near 1.0), run through the real updater so the full record path is
/// exercised. Quality lands at 1.0 under `test_config`.
async fn seeded_store(cfg: &EngineConfig, keys: &[StrikeKey]) -> Arc<BaselineStore> {
    common::logger::init_logger("pipeline-tests");
    let store = Arc::new(BaselineStore::new(cfg));
    let repo = Arc::new(InMemoryBaselineRepository::default());
    BaselineUpdater::new(Arc::clone(&store), repo, cfg.baseline_lookback_days).spawn();

    let asks = [800u64, 1_000, 1_200, 900, 1_100, 1_000, 950, 1_050, 1_000, 1_000];
    for key in keys {
        for (i, ask) in asks.iter().enumerate() {
            store.record(window(*key, DAY_START_MS + i as u64 * WINDOW_MS, 1_000, *ask));
        }
    }
    for key in keys {
        wait_for_samples(&store, key, asks.len() as u64).await;
    }
    store
}

async fn wait_for_samples(store: &BaselineStore, key: &StrikeKey, expected: u64) {
    for _ in 0..500 {
        if store.get(key).sample_count >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("updater never applied the seeded history for {key}");
}

#[tokio::test(flavor = "multi_thread")]
async fn extreme_pressure_emits_signal_end_to_end() {
    let cfg = test_config();
    let store = seeded_store(&cfg, &[call_key()]).await;
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    let signals = engine.evaluate(&[strong_window(call_key(), BATCH_START_MS)]);

    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.key, call_key());
    assert_eq!(signal.dominant_side, DominantSide::Ask);
    assert_eq!(signal.strength, SignalStrength::Extreme);
    assert!(signal.z_score > 4.0, "ratio 3.0 against a ~1.0 baseline");
    assert_eq!(engine.key_state(&call_key()), KeyState::Emitted);
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregated_events_flow_through_to_a_signal() {
    let cfg = test_config();
    let store = seeded_store(&cfg, &[call_key()]).await;
    let mut engine = SignalEngine::new(cfg.clone(), store).unwrap();
    let mut aggregator = PressureAggregator::new(cfg.window_ms, cfg.idle_eviction_ms);

    let mut batch = Vec::new();
    let mut ingest = |ts_ms: u64, size: u64, initiator: InitiatorSide| {
        let event = OrderEvent {
            key: call_key(),
            ts_ms,
            price: 1.25,
            size,
            initiator,
        };
        if let Some(closed) = aggregator.ingest(&event) {
            batch.push(closed);
        }
    };

    for i in 0..3u64 {
        ingest(BATCH_START_MS + i * 10_000, 1_000, InitiatorSide::Ask);
    }
    ingest(BATCH_START_MS + 40_000, 1_000, InitiatorSide::Bid);
    // boundary crossing closes the bucket
    ingest(BATCH_START_MS + WINDOW_MS + 1_000, 10, InitiatorSide::Ask);

    assert_eq!(batch.len(), 1);
    let signals = engine.evaluate(&batch);
    assert_eq!(signals.len(), 1);
    assert!(signals[0].strength >= SignalStrength::High);
}

#[tokio::test(flavor = "multi_thread")]
async fn straddle_flow_is_penalized_to_at_most_moderate() {
    let cfg = test_config();
    let call = call_key();
    let put = call.opposite_leg();
    let store = seeded_store(&cfg, &[call, put]).await;
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    // both legs of the strike, same bucket, balanced volume
    let signals = engine.evaluate(&[
        strong_window(call, BATCH_START_MS),
        strong_window(put, BATCH_START_MS),
    ]);

    assert!(!signals.is_empty());
    for signal in &signals {
        assert!(
            signal.market_making_score > 0.5,
            "balanced opposite legs must look like a quoted straddle"
        );
        assert!(
            signal.strength <= SignalStrength::Moderate,
            "straddle flow must not reach a high-conviction class"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinated_neighbor_strike_raises_confidence() {
    let cfg = test_config();
    let target = call_key();
    let neighbor = StrikeKey::new(10_500, OptionSide::Call);

    let store_alone = seeded_store(&cfg, &[target]).await;
    let mut alone = SignalEngine::new(cfg.clone(), store_alone).unwrap();
    let solo = alone.evaluate(&[strong_window(target, BATCH_START_MS)]);

    let store_swept = seeded_store(&cfg, &[target]).await;
    let mut swept = SignalEngine::new(cfg, store_swept).unwrap();
    let with_neighbor = swept.evaluate(&[
        strong_window(target, BATCH_START_MS),
        strong_window(neighbor, BATCH_START_MS),
    ]);

    let solo_conf = solo
        .iter()
        .find(|s| s.key == target)
        .expect("target emits alone")
        .confidence;
    let swept_conf = with_neighbor
        .iter()
        .find(|s| s.key == target)
        .expect("target emits in the sweep")
        .confidence;
    assert!(
        swept_conf > solo_conf,
        "same-direction neighbor inside the radius must add confidence"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn volume_gate_runs_before_scoring() {
    let cfg = test_config();
    let store = seeded_store(&cfg, &[call_key()]).await;
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    // ratio 6.0 but only 70 contracts
    let signals = engine.evaluate(&[window(call_key(), BATCH_START_MS, 10, 60)]);
    assert!(signals.is_empty());
    assert_eq!(engine.key_state(&call_key()), KeyState::Suppressed);
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_history_degrades_to_silence_not_error() {
    let cfg = test_config();
    let store = Arc::new(BaselineStore::new(&cfg));
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    // strong pressure, but the default context's quality sits below the gate
    let signals = engine.evaluate(&[strong_window(call_key(), BATCH_START_MS)]);
    assert!(signals.is_empty());
    assert_eq!(engine.key_state(&call_key()), KeyState::Suppressed);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_window_suppresses_only_its_key() {
    let cfg = test_config();
    let good = call_key();
    let bad = StrikeKey::new(12_000, OptionSide::Put);
    let store = seeded_store(&cfg, &[good]).await;
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    let mut broken = window(bad, BATCH_START_MS, 1_000, 3_000);
    broken.end_ms = broken.start_ms; // zero-length window

    let signals = engine.evaluate(&[broken, strong_window(good, BATCH_START_MS)]);

    assert_eq!(signals.len(), 1, "healthy key must survive the bad one");
    assert_eq!(signals[0].key, good);
    assert_eq!(engine.key_state(&bad), KeyState::Suppressed);
    assert_eq!(engine.key_state(&good), KeyState::Emitted);
}

#[tokio::test(flavor = "multi_thread")]
async fn key_states_track_the_pipeline() {
    let cfg = test_config();
    let store = seeded_store(&cfg, &[call_key()]).await;
    let mut engine = SignalEngine::new(cfg, store).unwrap();

    let unknown = StrikeKey::new(99_999, OptionSide::Put);
    assert_eq!(engine.key_state(&unknown), KeyState::Idle);

    engine.note_window_open(call_key());
    assert_eq!(engine.key_state(&call_key()), KeyState::WindowOpen);

    engine.evaluate(&[strong_window(call_key(), BATCH_START_MS)]);
    assert_eq!(engine.key_state(&call_key()), KeyState::Emitted);

    // next bucket sits below the pressure gate
    engine.evaluate(&[window(call_key(), BATCH_START_MS + WINDOW_MS, 1_000, 1_100)]);
    assert_eq!(engine.key_state(&call_key()), KeyState::Suppressed);
}

#[tokio::test(flavor = "multi_thread")]
async fn harness_reports_agreement_on_a_clear_signal() {
    let cfg = test_config();
    let store = seeded_store(&cfg, &[call_key()]).await;
    let mut harness = ComparisonHarness::new(cfg, store).unwrap();

    let result = harness.compare_once(&[strong_window(call_key(), BATCH_START_MS)]);

    assert_eq!(result.agreement, Agreement::Both);
    assert_eq!(result.direction_agreement, Some(true));
    assert!(result.confidence_delta.is_some());
    assert_eq!(result.engine_signals.len(), 1);
    assert_eq!(result.reference_signals.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn harness_separates_reference_only_emissions() {
    let cfg = test_config();
    // no seeded history: the engine's quality gate holds, the raw
    // threshold does not care
    let store = Arc::new(BaselineStore::new(&cfg));
    let mut harness = ComparisonHarness::new(cfg, store).unwrap();

    let result = harness.compare_once(&[strong_window(call_key(), BATCH_START_MS)]);

    assert_eq!(result.agreement, Agreement::ReferenceOnly);
    assert_eq!(result.direction_agreement, None);
    assert_eq!(result.confidence_delta, None);
}
