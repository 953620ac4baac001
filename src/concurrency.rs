//! Parent-scoped mutual exclusion for store writes
//!
//! Every write that reads the sibling-name index and then writes it (create,
//! rename) holds the write lock of the parent it targets for the whole
//! check-then-insert sequence. Deleting a folder takes the folder's own lock while
//! it re-checks for children, which excludes creates racing into it. Writes under
//! different parents never contend.

use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-parent lock manager
pub struct ParentLockManager {
    /// Map from parent id to its lock
    locks: Arc<RwLock<HashMap<NodeId, Arc<RwLock<()>>>>>,
}

impl ParentLockManager {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get or create the lock for a parent scope.
    pub fn get_lock(&self, parent_id: &NodeId) -> Arc<RwLock<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(parent_id) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Another thread may have inserted it between the two guards
        map.entry(parent_id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drop the lock of a scope that no longer exists.
    ///
    /// The entry is kept while any caller still holds a handle to it.
    pub fn release(&self, parent_id: &NodeId) {
        let mut map = self.locks.write();
        if let Some(lock) = map.get(parent_id) {
            if Arc::strong_count(lock) == 1 {
                map.remove(parent_id);
            }
        }
    }

    /// Number of scopes currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.read().len()
    }
}

impl Default for ParentLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ParentLockManager {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}
