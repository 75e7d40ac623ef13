//! Signal-detection engine for options order-flow pressure.
//!
//! Turns batches of closed pressure windows into zero or one classified
//! signal per key: baseline lookup, cross-strike coordination, market-making
//! filtering, and multi-factor confidence scoring, orchestrated by
//! `SignalEngine`.
//!
//! Non-responsibilities:
//! - Vendor feeds, reconnection, symbol resolution (upstream collaborators).
//! - Alert delivery, display, paper trading (downstream consumers).
//! - Order execution of any kind.

pub mod aggregator;
pub mod algorithm;
pub mod coordination;
pub mod errors;
pub mod harness;
pub mod market_making;
pub mod scorer;
pub mod signal_engine;

pub use aggregator::PressureAggregator;
pub use algorithm::{ReferenceAlgorithm, SignalAlgorithm};
pub use coordination::CoordinationIndex;
pub use errors::EngineError;
pub use harness::{Agreement, ComparisonHarness, ComparisonResult};
pub use market_making::MarketMakingAssessment;
pub use signal_engine::SignalEngine;
