//! Rolling statistical baselines for pressure windows.
//!
//! Responsibilities:
//! - Serve a per-key `BaselineContext` (mean, std, percentile ladder,
//!   data quality) synchronously to the scoring path.
//! - Fold newly closed windows into the statistics off the critical path,
//!   via a bounded queue drained by a single background updater.
//! - Persist per-day aggregates so the rolling window survives restarts.
//!
//! Non-responsibilities:
//! - Scoring (the engine crate owns that).
//! - Deciding what counts as anomalous; this crate only describes "normal".

pub mod model;
pub mod repository;
pub mod sqlite;
pub mod stats;
pub mod store;
pub mod updater;

pub use model::{BaselineContext, DayStats, PercentileLadder};
pub use repository::BaselineRepository;
pub use store::BaselineStore;
pub use updater::BaselineUpdater;
