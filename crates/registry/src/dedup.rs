use alloy_primitives::B256;
use std::collections::{HashSet, VecDeque};

/// Bounded set of already-processed (tx hash, log index) keys.
///
/// Insertion-ordered eviction keeps memory bounded over a process lifetime;
/// re-observing a long-evicted log would reprocess it, which every handler
/// tolerates because dispatch is idempotent per key.
#[derive(Debug)]
pub(crate) struct VisitedSet {
    capacity: usize,
    set: HashSet<(B256, u64)>,
    order: VecDeque<(B256, u64)>,
}

impl VisitedSet {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            set: HashSet::with_capacity(capacity.max(1)),
            order: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Records the key, returning `false` if it was already present.
    pub(crate) fn insert(&mut self, key: (B256, u64)) -> bool {
        if !self.set.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }
}
