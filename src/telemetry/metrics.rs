//! Metric instruments for tradeq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one the instruments are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

fn meter() -> Meter {
    opentelemetry::global::meter("tradeq")
}

/// Counter: work items accepted from inbound.
pub fn items_submitted() -> Counter<u64> {
    meter()
        .u64_counter("tradeq.items.submitted")
        .with_description("Number of work items accepted from inbound")
        .build()
}

/// Counter: work items that finished processing.
/// Labels: `outcome` ("ok" | "error").
pub fn items_completed() -> Counter<u64> {
    meter()
        .u64_counter("tradeq.items.completed")
        .with_description("Number of work items that finished processing")
        .build()
}

/// Up/down counter: items currently processing.
pub fn items_in_flight() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("tradeq.items.in_flight")
        .with_description("Work items currently processing")
        .build()
}

/// Up/down counter: items queued behind their key or the concurrency cap.
pub fn queue_depth() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("tradeq.queue.depth")
        .with_description("Work items waiting to be dispatched")
        .build()
}

/// Histogram: per-item processing duration in milliseconds.
pub fn processing_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("tradeq.processing.duration_ms")
        .with_description("Per-item processing duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Instruments used by one dispatch run, built once up front.
#[derive(Clone)]
pub(crate) struct DispatchMetrics {
    pub submitted: Counter<u64>,
    pub completed: Counter<u64>,
    pub in_flight: UpDownCounter<i64>,
    pub queue_depth: UpDownCounter<i64>,
    pub duration_ms: Histogram<f64>,
}

impl DispatchMetrics {
    pub(crate) fn new() -> Self {
        Self {
            submitted: items_submitted(),
            completed: items_completed(),
            in_flight: items_in_flight(),
            queue_depth: queue_depth(),
            duration_ms: processing_duration_ms(),
        }
    }
}
