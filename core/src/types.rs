use serde::{Deserialize, Serialize};

/// Call or put leg of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    pub fn opposite(self) -> Self {
        match self {
            OptionSide::Call => OptionSide::Put,
            OptionSide::Put => OptionSide::Call,
        }
    }
}

/// Which side of the book the trade executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiatorSide {
    /// Seller hit the bid.
    Bid,
    /// Buyer lifted the ask.
    Ask,
    /// Executed inside the spread or classification unavailable.
    Neither,
}

/// Identity of one tracked contract: strike (in cents) plus option side.
///
/// Strikes are carried as integer cents so the key is hashable and ordering
/// is exact; no float comparisons anywhere on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrikeKey {
    pub strike_cents: i64,
    pub side: OptionSide,
}

impl StrikeKey {
    pub fn new(strike_cents: i64, side: OptionSide) -> Self {
        Self { strike_cents, side }
    }

    /// Same strike, opposite option side (the other leg of a straddle).
    pub fn opposite_leg(&self) -> Self {
        Self {
            strike_cents: self.strike_cents,
            side: self.side.opposite(),
        }
    }

    pub fn strike(&self) -> f64 {
        self.strike_cents as f64 / 100.0
    }
}

impl std::fmt::Display for StrikeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match self.side {
            OptionSide::Call => "C",
            OptionSide::Put => "P",
        };
        write!(f, "{:.2}{}", self.strike(), side)
    }
}

/// One normalized order-book event from the ingestion boundary.
///
/// Vendor schema resolution happens upstream; by the time an event reaches
/// the aggregator it is already keyed and classified.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEvent {
    pub key: StrikeKey,
    pub ts_ms: u64,
    pub price: f64,
    pub size: u64,
    pub initiator: InitiatorSide,
}

/// Which side of the flow dominates a closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominantSide {
    /// Ask-initiated volume dominates (aggressive buying).
    Ask,
    /// Bid-initiated volume dominates (aggressive selling).
    Bid,
}

/// Aggregate of one fixed time bucket for one (strike, side) key.
///
/// Created by the aggregator when the first event of a bucket arrives and
/// immutable once closed. Consumed exactly once by the evaluation pipeline,
/// then archived into the baseline history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureWindow {
    pub key: StrikeKey,
    pub start_ms: u64,
    pub end_ms: u64,
    pub bid_volume: u64,
    pub ask_volume: u64,
    pub trade_count: u64,
    /// Out-of-order events dropped while this window was open.
    pub dropped_events: u64,
    pub first_price: f64,
    pub last_price: f64,
}

impl PressureWindow {
    /// Ask-initiated over bid-initiated volume. The denominator is floored
    /// at one contract so a one-sided window yields a large finite ratio
    /// instead of a division by zero.
    pub fn pressure_ratio(&self) -> f64 {
        self.ask_volume as f64 / (self.bid_volume.max(1)) as f64
    }

    pub fn dominant_side(&self) -> DominantSide {
        if self.ask_volume >= self.bid_volume {
            DominantSide::Ask
        } else {
            DominantSide::Bid
        }
    }

    pub fn total_volume(&self) -> u64 {
        self.bid_volume + self.ask_volume
    }

    /// Fraction of events that survived ordering checks. 1.0 when nothing
    /// was dropped; degrades toward 0 as out-of-order deliveries pile up.
    pub fn completeness(&self) -> f64 {
        let seen = self.trade_count + self.dropped_events;
        if seen == 0 {
            return 0.0;
        }
        self.trade_count as f64 / seen as f64
    }

    /// Net price move over the window, as a fraction of the opening price.
    pub fn price_change(&self) -> f64 {
        if self.first_price <= 0.0 {
            return 0.0;
        }
        (self.last_price - self.first_price) / self.first_price
    }
}

/// Discrete strength class, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalStrength {
    None,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

/// What the caller should do with the signal. Derived from strength; the
/// engine itself never executes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    StrongFollow,
    Follow,
    Monitor,
    NoAction,
}

impl RecommendedAction {
    pub fn for_strength(strength: SignalStrength) -> Self {
        match strength {
            SignalStrength::Extreme | SignalStrength::VeryHigh => RecommendedAction::StrongFollow,
            SignalStrength::High => RecommendedAction::Follow,
            SignalStrength::Moderate => RecommendedAction::Monitor,
            SignalStrength::None => RecommendedAction::NoAction,
        }
    }
}

/// Terminal output of the pipeline. Ownership transfers to the caller;
/// the engine retains nothing beyond its bounded recent-window history.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub key: StrikeKey,
    pub ts_ms: u64,
    pub dominant_side: DominantSide,
    pub pressure_ratio: f64,
    pub z_score: f64,
    pub market_making_score: f64,
    pub confidence: f64,
    pub strength: SignalStrength,
    pub action: RecommendedAction,
}
