use parking_lot::RwLock;
use std::collections::HashSet;
use upkeep_types::{UpkeepId, UpkeepType};

/// The set of currently monitored upkeep ids.
///
/// Membership here is the single source of truth for "is this upkeep
/// currently monitored". Safe under concurrent read/write; mutations are
/// linearized by the lock and carry no cross-upkeep ordering guarantee.
#[derive(Debug, Default)]
pub struct ActiveUpkeepList {
    inner: RwLock<HashSet<UpkeepId>>,
}

impl ActiveUpkeepList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the set with `ids`.
    pub fn reset(&self, ids: impl IntoIterator<Item = UpkeepId>) {
        let next: HashSet<UpkeepId> = ids.into_iter().collect();
        *self.inner.write() = next;
    }

    /// Adds ids, returning how many were not already present.
    pub fn add(&self, ids: &[UpkeepId]) -> usize {
        let mut set = self.inner.write();
        ids.iter().filter(|id| set.insert(**id)).count()
    }

    /// Removes ids, returning how many were actually present.
    pub fn remove(&self, ids: &[UpkeepId]) -> usize {
        let mut set = self.inner.write();
        ids.iter().filter(|id| set.remove(id)).count()
    }

    /// Whether the id is currently active.
    pub fn is_active(&self, id: UpkeepId) -> bool {
        self.inner.read().contains(&id)
    }

    /// Number of active ids.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// All active ids whose trigger type matches any of `types`; an empty
    /// filter returns everything.
    ///
    /// Holds the read lock only for the snapshot copy.
    pub fn view(&self, types: &[UpkeepType]) -> Vec<UpkeepId> {
        let snapshot: Vec<UpkeepId> = self.inner.read().iter().copied().collect();
        if types.is_empty() {
            return snapshot;
        }
        snapshot.into_iter().filter(|id| types.contains(&id.trigger_type())).collect()
    }
}
