//! Dispatch span helpers.
//!
//! One span per dispatch run, and one child span per processed item.

use tracing::Span;
use uuid::Uuid;

/// Start the span covering a whole dispatch run.
pub fn start_dispatch_span(dispatch_id: &Uuid, max_concurrency: usize) -> Span {
    tracing::info_span!(
        "dispatch.run",
        "dispatch.id" = %dispatch_id,
        "dispatch.max_concurrency" = max_concurrency,
        "dispatch.emitted" = tracing::field::Empty,
    )
}

/// Start the span for processing one item.
///
/// `item.outcome` is filled in by [`record_outcome`].
pub fn start_item_span(key: &str) -> Span {
    tracing::debug_span!(
        "dispatch.item",
        "item.key" = key,
        "item.outcome" = tracing::field::Empty,
    )
}

pub fn record_outcome(span: &Span, success: bool) {
    span.record("item.outcome", if success { "ok" } else { "error" });
}

/// Record a run-level state transition on the given span.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
