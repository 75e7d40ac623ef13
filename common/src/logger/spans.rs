use tracing::{Level, Span};

use super::BatchId;

/// Create a root span for one evaluation batch.
pub fn root_span(name: &'static str, batch_id: &BatchId) -> Span {
    tracing::span!(
        Level::INFO,
        "batch",
        name = name,
        batch_id = %batch_id
    )
}

/// Create a child span (inherits batch_id automatically).
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "stage", name = name)
}
