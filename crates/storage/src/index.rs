//! Secondary index for state queries
//!
//! `StateIndex` maps replica → upload state → filenames, so that
//! "all files in state S on replica R" costs O(result) instead of a scan of
//! every entry. It is updated under the same exclusive access as the entry
//! map and must always agree with a full scan.

use replica_admin_core::{ReplicaId, UploadState};
use std::collections::{HashMap, HashSet};

/// Secondary index: (ReplicaId, UploadState) → filenames
#[derive(Debug, Default, Clone)]
pub struct StateIndex {
    index: HashMap<ReplicaId, HashMap<UploadState, HashSet<String>>>,
}

impl StateIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
        }
    }

    /// Add a filename under (replica, state)
    pub fn insert(&mut self, replica: &ReplicaId, state: UploadState, filename: &str) {
        self.index
            .entry(replica.clone())
            .or_default()
            .entry(state)
            .or_default()
            .insert(filename.to_string());
    }

    /// Remove a filename from (replica, state)
    ///
    /// Empty sets and empty per-replica maps are dropped so the index does
    /// not accumulate dead keys.
    pub fn remove(&mut self, replica: &str, state: UploadState, filename: &str) {
        if let Some(states) = self.index.get_mut(replica) {
            if let Some(files) = states.get_mut(&state) {
                files.remove(filename);
                if files.is_empty() {
                    states.remove(&state);
                }
            }
            if states.is_empty() {
                self.index.remove(replica);
            }
        }
    }

    /// Move a filename from one state to another on the same replica
    pub fn transition(
        &mut self,
        replica: &ReplicaId,
        from: Option<UploadState>,
        to: UploadState,
        filename: &str,
    ) {
        if let Some(from) = from {
            self.remove(replica.as_str(), from, filename);
        }
        self.insert(replica, to, filename);
    }

    /// Filenames under (replica, state), if any
    pub fn get(&self, replica: &str, state: UploadState) -> Option<&HashSet<String>> {
        self.index.get(replica).and_then(|states| states.get(&state))
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of replicas with at least one indexed file
    pub fn len(&self) -> usize {
        self.index.len()
    }
}
