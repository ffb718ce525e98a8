//! Scheduling state and the scheduling pass.
//!
//! [`Scheduler`] owns the keyed queues and the admission state as one unit.
//! Every mutation goes through `&mut self`, so the owner of the scheduler is
//! the single critical section: "check capacity, then admit" can never
//! interleave with another pass.
//!
//! Fairness across keys is round-robin by readiness. A key joins the tail of
//! the ready ring when it gains a pending item while idle, or when its
//! in-flight item completes and more items are waiting. A pass always takes
//! keys from the head of the ring.

use std::collections::VecDeque;

use super::admission::Admission;
use super::queue::KeyedQueues;
use crate::error::Result;

/// An item selected to start processing.
#[derive(Debug)]
pub struct Launch<T> {
    pub key: String,
    pub item: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    queues: KeyedQueues<T>,
    admission: Admission,
    // Invariant: a key is in `ready` iff it has pending items and is not active.
    ready: VecDeque<String>,
}

impl<T> Scheduler<T> {
    pub fn new(max_concurrency: usize) -> Result<Self> {
        Ok(Self {
            queues: KeyedQueues::new(),
            admission: Admission::new(max_concurrency)?,
            ready: VecDeque::new(),
        })
    }

    /// Queue `item` behind any earlier items for `key`.
    pub fn enqueue(&mut self, key: &str, item: T) {
        let first_pending = self.queues.push(key, item);
        if first_pending && !self.admission.is_active(key) {
            self.ready.push_back(key.to_string());
        }
    }

    /// Select the next item to start, admitting its key.
    ///
    /// Returns `None` when the budget is exhausted or every key with pending
    /// work already has an item in flight.
    pub fn next_launch(&mut self) -> Option<Launch<T>> {
        if !self.admission.has_capacity() {
            return None;
        }
        while let Some(key) = self.ready.pop_front() {
            // An active key is put back on the ring by `complete`.
            if !self.queues.has_pending(&key) || !self.admission.try_admit(&key) {
                continue;
            }
            if let Some(item) = self.queues.pop(&key) {
                return Some(Launch { key, item });
            }
            self.admission.release(&key);
        }
        None
    }

    /// Run one scheduling pass: launch as many items as the budget allows.
    ///
    /// Calling this with nothing eligible is a no-op, so redundant passes are
    /// harmless.
    pub fn schedule_pass(&mut self) -> Vec<Launch<T>> {
        let mut launches = Vec::new();
        while let Some(launch) = self.next_launch() {
            launches.push(launch);
        }
        launches
    }

    /// Record that the in-flight item for `key` finished, success or failure.
    ///
    /// Returns `false` if `key` was not in flight.
    pub fn complete(&mut self, key: &str) -> bool {
        if !self.admission.release(key) {
            return false;
        }
        if self.queues.has_pending(key) {
            self.ready.push_back(key.to_string());
        }
        true
    }

    /// No pending items and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.queues.is_empty() && self.admission.is_idle()
    }

    /// Drop all pending work. In-flight bookkeeping is left untouched.
    pub fn clear_pending(&mut self) -> usize {
        self.ready.clear();
        self.queues.clear()
    }

    pub fn pending(&self) -> usize {
        self.queues.len()
    }

    pub fn depth(&self, key: &str) -> usize {
        self.queues.depth(key)
    }

    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.admission.is_active(key)
    }

    pub fn max_concurrency(&self) -> usize {
        self.admission.max_concurrency()
    }
}
