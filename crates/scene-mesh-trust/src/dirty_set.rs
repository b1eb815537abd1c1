//! Concurrent set of scene ids pending trust-score recomputation.

use std::collections::HashSet;

use scene_mesh_core::{LockLevel, OrderedRwLock};
use uuid::Uuid;

/// Reader/writer-locked set of dirty scene ids.
///
/// `mark` is idempotent; `snapshot` returns a copy so a caller may iterate
/// the dirty set without holding the lock across the iteration.
pub struct DirtySet {
    ids: OrderedRwLock<HashSet<Uuid>>,
}

impl Default for DirtySet {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtySet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: OrderedRwLock::new(LockLevel::DirtySet, HashSet::new()),
        }
    }

    /// Marks a scene dirty. A second `mark` of the same id is a no-op.
    pub fn mark(&self, id: Uuid) {
        self.ids.write().insert(id);
    }

    /// Clears a scene's dirty flag, if set.
    pub fn clear(&self, id: Uuid) {
        self.ids.write().remove(&id);
    }

    /// A point-in-time copy of the dirty ids.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Uuid> {
        self.ids.read().iter().copied().collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.ids.read().len()
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.read().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_is_idempotent() {
        let set = DirtySet::new();
        let id = Uuid::new_v4();
        set.mark(id);
        set.mark(id);
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn clear_removes_from_snapshot() {
        let set = DirtySet::new();
        let id = Uuid::new_v4();
        set.mark(id);
        set.clear(id);
        assert!(!set.contains(id));
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let set = DirtySet::new();
        let id = Uuid::new_v4();
        set.mark(id);
        let snap = set.snapshot();
        set.mark(Uuid::new_v4());
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn clear_of_unmarked_id_is_a_no_op() {
        let set = DirtySet::new();
        set.clear(Uuid::new_v4());
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn mark_happens_before_concurrent_snapshot_observes_it() {
        use std::sync::Arc;
        use std::thread;

        let set = Arc::new(DirtySet::new());
        let id = Uuid::new_v4();
        set.mark(id);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                thread::spawn(move || set.snapshot().contains(&id))
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
