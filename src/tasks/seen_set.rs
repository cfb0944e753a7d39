//! Bounded de-duplication set with FIFO eviction

use std::collections::{HashSet, VecDeque};

pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Remembers recently seen keys.
///
/// Once an insert pushes the size above `capacity`, the oldest entries are
/// evicted until `low_watermark` remain. The size never exceeds `capacity`
/// after any call returns.
#[derive(Debug, Clone)]
pub struct SeenSet {
    capacity: usize,
    low_watermark: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl SeenSet {
    /// Evicts down to 80% of `capacity`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self::with_watermarks(capacity, capacity * 4 / 5)
    }

    pub fn with_watermarks(capacity: usize, low_watermark: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            low_watermark: low_watermark.min(capacity - 1),
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Record `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.members.contains(key) {
            return false;
        }
        self.members.insert(key.to_string());
        self.order.push_back(key.to_string());

        if self.order.len() > self.capacity {
            while self.order.len() > self.low_watermark {
                if let Some(oldest) = self.order.pop_front() {
                    self.members.remove(&oldest);
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}
