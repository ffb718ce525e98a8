//! Keyed queue store: one FIFO per key, created lazily, removed when drained.

use std::collections::{HashMap, VecDeque};

/// Pending work, grouped by key.
///
/// A key has an entry only while it has at least one pending item. Items for
/// a key always come out in the order they went in.
#[derive(Debug)]
pub struct KeyedQueues<T> {
    queues: HashMap<String, VecDeque<T>>,
    len: usize,
}

impl<T> Default for KeyedQueues<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> KeyedQueues<T> {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
            len: 0,
        }
    }

    /// Append `item` to the tail of `key`'s queue.
    ///
    /// Returns `true` when the key had nothing pending before this call.
    pub fn push(&mut self, key: &str, item: T) -> bool {
        self.len += 1;
        match self.queues.get_mut(key) {
            Some(queue) => {
                queue.push_back(item);
                false
            }
            None => {
                self.queues.insert(key.to_string(), VecDeque::from([item]));
                true
            }
        }
    }

    /// Remove and return the head item for `key`, dropping the queue once empty.
    pub fn pop(&mut self, key: &str) -> Option<T> {
        let queue = self.queues.get_mut(key)?;
        let item = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        if item.is_some() {
            self.len -= 1;
        }
        item
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.queues.contains_key(key)
    }

    /// Number of items pending for `key`.
    pub fn depth(&self, key: &str) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }

    /// Total pending items across all keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn key_count(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every pending item.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.queues.clear();
        self.len = 0;
        dropped
    }
}
