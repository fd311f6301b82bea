//! Read-only projections over the admin registry
//!
//! `ConsistencyView` is what reporting and reconciliation tools see. It
//! wraps anything that dereferences to an `AdminState` (a plain reference,
//! or a read guard held by the engine), so every projection is computed
//! live against one consistent state. Nothing is cached.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Deref;

use serde::Serialize;

use replica_admin_core::{FileEntry, Result, UploadState};

use crate::admin_state::AdminState;

/// Per-replica state counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaSummary {
    /// Replica id
    pub replica: String,
    /// Number of files in each state on this replica
    pub states: BTreeMap<UploadState, usize>,
}

/// Snapshot report of the whole registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Number of registered files
    pub total_files: usize,
    /// Per-replica counts, ordered by replica id
    pub replicas: Vec<ReplicaSummary>,
    /// Files not `UPLOAD_COMPLETED` on every known replica, sorted
    pub incomplete_files: Vec<String>,
}

/// Live read-only view over an `AdminState`
pub struct ConsistencyView<G> {
    state: G,
}

impl<G> ConsistencyView<G>
where
    G: Deref<Target = AdminState>,
{
    /// Wrap a state reference or guard
    pub fn new(state: G) -> Self {
        ConsistencyView { state }
    }

    /// Number of registered files
    pub fn file_count(&self) -> usize {
        self.state.len()
    }

    /// Every registered filename
    pub fn all_filenames(&self) -> HashSet<String> {
        self.state.all_filenames()
    }

    /// Filenames in `state` on `replica`; empty when nothing matches
    pub fn filenames_with_state(&self, replica: &str, state: UploadState) -> HashSet<String> {
        self.state.filenames_with_state(replica, state)
    }

    /// Entry for `filename`, failing with `NotFound`
    pub fn entry(&self, filename: &str) -> Result<&FileEntry> {
        self.state.get_entry(filename)
    }

    /// Count of files per state on `replica`. States with no files are omitted.
    pub fn replica_summary(&self, replica: &str) -> ReplicaSummary {
        let states = UploadState::ALL
            .iter()
            .filter_map(|&s| {
                let n = self.state.filenames_with_state(replica, s).len();
                (n > 0).then_some((s, n))
            })
            .collect();
        ReplicaSummary {
            replica: replica.to_string(),
            states,
        }
    }

    /// Files that are not `UPLOAD_COMPLETED` on every known replica
    pub fn incomplete_files(&self) -> BTreeSet<String> {
        let replicas = self.state.known_replicas();
        self.state
            .entries()
            .filter(|entry| {
                replicas.iter().any(|r| {
                    entry
                        .replica_record(r.as_str())
                        .map(|rec| rec.upload_state() != UploadState::UploadCompleted)
                        .unwrap_or(true)
                })
            })
            .map(|entry| entry.filename().to_string())
            .collect()
    }

    /// Build a full report
    pub fn report(&self) -> ConsistencyReport {
        ConsistencyReport {
            total_files: self.state.len(),
            replicas: self
                .state
                .known_replicas()
                .iter()
                .map(|r| self.replica_summary(r.as_str()))
                .collect(),
            incomplete_files: self.incomplete_files().into_iter().collect(),
        }
    }
}
