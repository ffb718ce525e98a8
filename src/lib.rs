//! # tradeq
//!
//! Keyed, order-preserving work dispatcher.
//!
//! Consumes a live stream of keyed work items and produces a stream of
//! results such that items sharing a key finish in submission order and no
//! more than a fixed number of items process at once. The result stream ends
//! exactly when inbound has ended and every admitted item has finished.
//!
//! Ships with a trade notional processor, an HTTP/NDJSON transport, and
//! OpenTelemetry observability.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod model;
pub mod processor;
pub mod server;
pub mod telemetry;

pub use dispatch::{DispatchConfig, Dispatcher, FailurePolicy, ResultStream};
pub use error::{Error, Result};
pub use model::{Trade, TradeResult, WorkItem};
pub use processor::{Processor, TradeProcessor, processor_fn};
