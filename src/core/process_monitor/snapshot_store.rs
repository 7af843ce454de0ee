use std::sync::Arc;

use parking_lot::RwLock;

use super::types::Snapshot;

struct Slots {
    current: Arc<Snapshot>,
    previous: Arc<Snapshot>,
}

/// Holds the current and previous snapshots.
///
/// Readers always observe a complete snapshot: replacing one happens under a
/// single write lock.
pub struct SnapshotStore {
    slots: RwLock<Slots>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                current: Arc::new(Snapshot::empty()),
                previous: Arc::new(Snapshot::empty()),
            }),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.slots.read().current)
    }

    pub fn previous(&self) -> Arc<Snapshot> {
        Arc::clone(&self.slots.read().previous)
    }

    /// Install `next` as current and return the snapshot it replaced.
    ///
    /// The write lock covers only the pointer rotation.
    pub fn swap(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        let mut slots = self.slots.write();

        let old = std::mem::replace(&mut slots.current, next);
        slots.previous = Arc::clone(&old);
        old
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
