//! Structured events emitted by the dispatcher on every state transition.
//!
//! Consumers attach an observer channel to build dashboards, audit logs, or
//! to check scheduling behaviour in tests. Events from one dispatch run carry
//! strictly increasing sequence numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A structured event emitted by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ItemQueued {
        key: String,
        depth: usize,
    },
    ItemStarted {
        key: String,
        in_flight: usize,
    },
    ItemFinished {
        key: String,
        in_flight: usize,
        success: bool,
    },
    InboundClosed {
        pending: usize,
        in_flight: usize,
    },
    OutputClosed {
        emitted: u64,
    },
    Aborted {
        reason: String,
    },
}

/// Sequencing sender half for dispatcher events. A sink without a channel
/// drops everything.
#[derive(Debug, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<Event>>,
    seq: u64,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::UnboundedSender<Event>>) -> Self {
        Self { tx, seq: 0 }
    }

    pub(crate) fn emit(&mut self, kind: EventKind) {
        let Some(tx) = &self.tx else { return };
        self.seq += 1;
        let event = Event {
            seq: self.seq,
            timestamp: Utc::now(),
            kind,
        };
        if tx.send(event).is_err() {
            // Observer went away; stop sequencing for it.
            self.tx = None;
        }
    }
}
