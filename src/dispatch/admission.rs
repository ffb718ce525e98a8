//! # Admission control
//!
//! Tracks which keys have an item in flight and how many items are in flight
//! overall.
//!
//! ## Invariants
//! - At most one item per key is in flight.
//! - `in_flight() <= max_concurrency()` at all times.
//! - `in_flight()` always equals the number of active keys.

use std::collections::HashSet;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Admission {
    max_concurrency: usize,
    in_flight: usize,
    active: HashSet<String>,
}

impl Admission {
    /// Create an admission controller. A zero cap is rejected.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::InvalidConcurrency(max_concurrency));
        }
        Ok(Self {
            max_concurrency,
            in_flight: 0,
            active: HashSet::new(),
        })
    }

    /// Admit `key` if the global cap has room and the key is idle.
    pub fn try_admit(&mut self, key: &str) -> bool {
        if !self.has_capacity() || self.active.contains(key) {
            return false;
        }
        self.active.insert(key.to_string());
        self.in_flight += 1;
        debug_assert_eq!(self.in_flight, self.active.len());
        true
    }

    /// Release a key admitted earlier.
    ///
    /// Returns `false` (and changes nothing) if the key was not active, so a
    /// stray release can never drive the counter out of step with the set.
    pub fn release(&mut self, key: &str) -> bool {
        if !self.active.remove(key) {
            return false;
        }
        self.in_flight -= 1;
        debug_assert_eq!(self.in_flight, self.active.len());
        true
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains(key)
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.max_concurrency
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }
}
