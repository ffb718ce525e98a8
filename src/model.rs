//! Core data model.
//!
//! A work item is something that needs processing. It has a key, which is the
//! ordering and exclusivity domain, and an opaque payload the dispatcher never
//! looks at. Trades are the concrete payload the service handles.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work submitted to the dispatcher.
///
/// Items sharing a key are processed one at a time, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<P> {
    pub key: String,
    pub payload: P,
}

impl<P> WorkItem<P> {
    pub fn new(key: impl Into<String>, payload: P) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// An inbound trade. Trades are keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
}

impl Trade {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            quantity,
            price,
        }
    }

}

/// Trades are keyed by their id.
impl From<Trade> for WorkItem<Trade> {
    fn from(trade: Trade) -> Self {
        WorkItem::new(trade.id.clone(), trade)
    }
}

/// Outcome of processing one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub id: String,
    pub symbol: String,
    pub notional: f64,
    pub status: Status,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Processed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Processed => write!(f, "PROCESSED"),
        }
    }
}
