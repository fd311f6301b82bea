//! AdminState: the registry of all file entries
//!
//! This is the unlocked data structure behind the admin store. It owns every
//! `FileEntry` (keyed by filename), the secondary `StateIndex`, and the set
//! of replica ids that have ever reported a state. Callers serialize access
//! themselves; the engine wraps it in a `parking_lot::RwLock`.
//!
//! # Design Notes
//!
//! - **Index maintenance**: every path that adds, removes or changes a
//!   replica record goes through this type, so the index is updated in the
//!   same `&mut self` borrow as the entry map.
//! - **Conflicts**: `put_entry` never overwrites. Replacing a reference
//!   checksum goes through `correct_checksum`.

use std::collections::{BTreeSet, HashSet};

use rustc_hash::FxHashMap;
use tracing::warn;

use replica_admin_core::{
    check_token, Error, FileEntry, PendingReply, ReplicaId, Result, Timestamp, UploadState,
};

use crate::index::StateIndex;

/// Registry of file entries plus derived indices
#[derive(Debug, Default, Clone)]
pub struct AdminState {
    /// Main map: filename → entry
    entries: FxHashMap<String, FileEntry>,
    /// Secondary index: (replica, state) → filenames
    index: StateIndex,
    /// Every replica id that has reported a state, for reporting
    known_replicas: BTreeSet<ReplicaId>,
}

impl AdminState {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `filename` is registered
    pub fn has_entry(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Entry for `filename`, or `None`
    pub fn entry(&self, filename: &str) -> Option<&FileEntry> {
        self.entries.get(filename)
    }

    /// Entry for `filename`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed filename, `NotFound` for an
    /// unregistered one.
    pub fn get_entry(&self, filename: &str) -> Result<&FileEntry> {
        check_token("filename", filename)?;
        self.entries
            .get(filename)
            .ok_or_else(|| Error::not_found(format!("no admin entry for file '{}'", filename)))
    }

    /// All entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Snapshot of every registered filename
    pub fn all_filenames(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Filenames whose record on `replica` is in `state`.
    ///
    /// Answered from the secondary index. Empty when nothing matches,
    /// including for a replica that has never reported.
    pub fn filenames_with_state(&self, replica: &str, state: UploadState) -> HashSet<String> {
        self.index
            .get(replica, state)
            .cloned()
            .unwrap_or_default()
    }

    /// Same result as `filenames_with_state`, computed by scanning every entry
    pub fn scan_filenames_with_state(&self, replica: &str, state: UploadState) -> HashSet<String> {
        self.entries
            .values()
            .filter(|e| {
                e.replica_record(replica)
                    .map(|r| r.upload_state() == state)
                    .unwrap_or(false)
            })
            .map(|e| e.filename().to_string())
            .collect()
    }

    /// Replica ids that have reported at least one state
    pub fn known_replicas(&self) -> &BTreeSet<ReplicaId> {
        &self.known_replicas
    }

    /// Reference checksum of `filename`
    pub fn checksum(&self, filename: &str) -> Result<&str> {
        self.get_entry(filename).map(|e| e.checksum())
    }

    /// Whether a state is recorded for (filename, replica).
    ///
    /// Unknown filenames answer `false` with a warning.
    pub fn has_state(&self, filename: &str, replica: &str) -> bool {
        match self.entries.get(filename) {
            Some(entry) => entry.has_replica_record(replica),
            None => {
                warn!(target: "replica_admin::store", filename, "No admin entry for file");
                false
            }
        }
    }

    /// Upload state of (filename, replica), failing with `NotFound`
    pub fn state(&self, filename: &str, replica: &str) -> Result<UploadState> {
        check_token("replica id", replica)?;
        self.get_entry(filename)?
            .replica_record(replica)
            .map(|r| r.upload_state())
            .ok_or_else(|| {
                Error::not_found(format!(
                    "no store state recorded for '{}' in '{}'",
                    filename, replica
                ))
            })
    }

    /// Register a new file.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the filename is registered, `InvalidArgument` for
    /// malformed tokens.
    pub fn put_entry(
        &mut self,
        filename: &str,
        checksum: &str,
        pending_reply: Option<PendingReply>,
        at: Timestamp,
    ) -> Result<&FileEntry> {
        let entry = FileEntry::new(filename, checksum, pending_reply, at)?;
        self.insert_entry(entry)
    }

    /// Register a fully built entry, indexing its replica records.
    pub fn insert_entry(&mut self, entry: FileEntry) -> Result<&FileEntry> {
        if self.entries.contains_key(entry.filename()) {
            return Err(Error::AlreadyExists(format!(
                "admin entry for file '{}' already exists",
                entry.filename()
            )));
        }
        for record in entry.replica_records() {
            self.index
                .insert(record.replica_id(), record.upload_state(), entry.filename());
            self.known_replicas.insert(record.replica_id().clone());
        }
        let filename = entry.filename().to_string();
        Ok(&*self.entries.entry(filename).or_insert(entry))
    }

    /// Remove an entry and all its replica records. Idempotent.
    pub fn remove_entry(&mut self, filename: &str) -> Option<FileEntry> {
        let removed = self.entries.remove(filename)?;
        for record in removed.replica_records() {
            self.index
                .remove(record.replica_id().as_str(), record.upload_state(), filename);
        }
        Some(removed)
    }

    /// Set the upload state of (filename, replica), creating the replica
    /// record when absent. Last write wins.
    pub fn set_replica_state(
        &mut self,
        filename: &str,
        replica: ReplicaId,
        state: UploadState,
        at: Timestamp,
    ) -> Result<&FileEntry> {
        let entry = self.entry_mut(filename)?;
        let previous = entry.set_replica_state(replica.clone(), state, at);
        self.index.transition(&replica, previous, state, filename);
        self.known_replicas.insert(replica);
        Ok(&self.entries[filename])
    }

    /// Replace the reference checksum of `filename`.
    ///
    /// The entry is rebuilt with the new checksum; replica records and any
    /// pending reply carry over. Returns the old checksum.
    pub fn correct_checksum(&mut self, filename: &str, checksum: &str) -> Result<String> {
        let old = self.get_entry(filename)?;
        let mut corrected =
            FileEntry::with_state(filename, checksum, old.pending_reply().cloned(), old.general_state())?;
        for record in old.replica_records() {
            corrected.insert_replica_record(record.clone());
        }
        let previous = old.checksum().to_string();
        // Same filename and same replica records: the index stays valid.
        self.entries.insert(filename.to_string(), corrected);
        Ok(previous)
    }

    /// Whether a pending reply is attached to `filename`.
    ///
    /// Unknown filenames answer `false` with a warning.
    pub fn has_pending_reply(&self, filename: &str) -> bool {
        match self.entries.get(filename) {
            Some(entry) => entry.has_pending_reply(),
            None => {
                warn!(target: "replica_admin::store", filename, "No admin entry for file");
                false
            }
        }
    }

    /// Attach a pending reply to `filename`, replacing any previous one
    pub fn set_pending_reply(&mut self, filename: &str, reply: PendingReply) -> Result<()> {
        self.entry_mut(filename)?.set_pending_reply(reply);
        Ok(())
    }

    /// Detach and return the pending reply of `filename`
    pub fn take_pending_reply(&mut self, filename: &str) -> Result<Option<PendingReply>> {
        Ok(self.entry_mut(filename)?.clear_pending_reply())
    }

    /// Drop all entries, the index and the known replicas
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.known_replicas.clear();
    }

    /// Check that the secondary index agrees with a full scan for every
    /// known replica and state.
    pub fn index_is_consistent(&self) -> bool {
        self.known_replicas.iter().all(|replica| {
            UploadState::ALL.iter().all(|&state| {
                self.filenames_with_state(replica.as_str(), state)
                    == self.scan_filenames_with_state(replica.as_str(), state)
            })
        })
    }

    fn entry_mut(&mut self, filename: &str) -> Result<&mut FileEntry> {
        check_token("filename", filename)?;
        self.entries
            .get_mut(filename)
            .ok_or_else(|| Error::not_found(format!("no admin entry for file '{}'", filename)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn rid(s: &str) -> ReplicaId {
        ReplicaId::new(s).unwrap()
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_put_and_query() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        state.put_entry("f2.arc", "chk2", None, ts(1)).unwrap();

        assert!(state.has_entry("f1.arc"));
        assert!(!state.has_entry("f3.arc"));
        assert_eq!(state.all_filenames(), set(&["f1.arc", "f2.arc"]));
        assert_eq!(state.checksum("f2.arc").unwrap(), "chk2");
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_put_existing_fails() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        let err = state.put_entry("f1.arc", "other", None, ts(2)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(state.checksum("f1.arc").unwrap(), "chk1");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::UploadCompleted, ts(2))
            .unwrap();

        assert!(state.remove_entry("f1.arc").is_some());
        assert!(state.remove_entry("f1.arc").is_none());
        assert!(state
            .filenames_with_state("BA1", UploadState::UploadCompleted)
            .is_empty());
        assert!(state.index_is_consistent());
    }

    #[test]
    fn test_set_replica_state_unknown_file() {
        let mut state = AdminState::new();
        let err = state
            .set_replica_state("nope", rid("BA1"), UploadState::UploadStarted, ts(1))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(state.known_replicas().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::UploadStarted, ts(10))
            .unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::UploadCompleted, ts(20))
            .unwrap();

        let entry = state.entry("f1.arc").unwrap();
        assert_eq!(entry.replica_count(), 1);
        let rec = entry.replica_record("BA1").unwrap();
        assert_eq!(rec.upload_state(), UploadState::UploadCompleted);
        assert_eq!(rec.last_state_change(), ts(20));

        assert!(state
            .filenames_with_state("BA1", UploadState::UploadStarted)
            .is_empty());
        assert_eq!(
            state.filenames_with_state("BA1", UploadState::UploadCompleted),
            set(&["f1.arc"])
        );
    }

    #[test]
    fn test_filenames_with_state() {
        let mut state = AdminState::new();
        for name in ["a.arc", "b.arc", "c.arc"] {
            state.put_entry(name, "x", None, ts(1)).unwrap();
        }
        state
            .set_replica_state("a.arc", rid("BA1"), UploadState::UploadCompleted, ts(2))
            .unwrap();
        state
            .set_replica_state("b.arc", rid("BA1"), UploadState::UploadCompleted, ts(2))
            .unwrap();
        state
            .set_replica_state("c.arc", rid("BA1"), UploadState::UploadFailed, ts(2))
            .unwrap();
        state
            .set_replica_state("c.arc", rid("BA2"), UploadState::UploadCompleted, ts(2))
            .unwrap();

        assert_eq!(
            state.filenames_with_state("BA1", UploadState::UploadCompleted),
            set(&["a.arc", "b.arc"])
        );
        assert_eq!(
            state.filenames_with_state("BA2", UploadState::UploadCompleted),
            set(&["c.arc"])
        );
        assert!(state
            .filenames_with_state("BA3", UploadState::UploadCompleted)
            .is_empty());
        assert_eq!(state.known_replicas().len(), 2);
        assert!(state.index_is_consistent());
    }

    #[test]
    fn test_state_lookup() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::DataUploaded, ts(2))
            .unwrap();

        assert!(state.has_state("f1.arc", "BA1"));
        assert!(!state.has_state("f1.arc", "BA2"));
        assert!(!state.has_state("nope", "BA1"));
        assert_eq!(state.state("f1.arc", "BA1").unwrap(), UploadState::DataUploaded);
        assert!(state.state("f1.arc", "BA2").unwrap_err().is_not_found());
        assert!(state.state("nope", "BA1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_malformed_identifiers_are_invalid_arguments() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        let invalid = |r: Result<()>| matches!(r, Err(Error::InvalidArgument(_)));

        assert!(invalid(state.get_entry("").map(|_| ())));
        assert!(invalid(state.checksum("").map(|_| ())));
        assert!(invalid(state.checksum("f1 .arc").map(|_| ())));
        assert!(invalid(state.state("f1.arc", "").map(|_| ())));
        assert!(invalid(state.state("", "BA1").map(|_| ())));
        assert!(invalid(state.correct_checksum("", "chk2").map(|_| ())));
        assert!(invalid(state.correct_checksum("f1.arc", "").map(|_| ())));
        assert!(invalid(
            state
                .set_replica_state("", ReplicaId::new("BA1").unwrap(), UploadState::UploadFailed, ts(2))
                .map(|_| ())
        ));
        assert!(invalid(state.set_pending_reply("", PendingReply::new("r"))));
        assert!(invalid(state.take_pending_reply("").map(|_| ())));

        // a well-formed but unknown filename is still NotFound
        assert!(state.checksum("other.arc").unwrap_err().is_not_found());
        assert_eq!(state.checksum("f1.arc").unwrap(), "chk1");
    }

    #[test]
    fn test_correct_checksum_keeps_records() {
        let mut state = AdminState::new();
        state
            .put_entry("f1.arc", "bad", Some(PendingReply::new("r1")), ts(1))
            .unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::UploadCompleted, ts(2))
            .unwrap();

        let old = state.correct_checksum("f1.arc", "good").unwrap();
        assert_eq!(old, "bad");
        assert_eq!(state.checksum("f1.arc").unwrap(), "good");
        assert_eq!(state.state("f1.arc", "BA1").unwrap(), UploadState::UploadCompleted);
        assert!(state.has_pending_reply("f1.arc"));
        assert!(state.index_is_consistent());

        assert!(state.correct_checksum("nope", "x").unwrap_err().is_not_found());
        assert!(matches!(
            state.correct_checksum("f1.arc", ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pending_reply() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        assert!(!state.has_pending_reply("f1.arc"));
        assert!(!state.has_pending_reply("unknown.arc"));

        state
            .set_pending_reply("f1.arc", PendingReply::new("corr-1"))
            .unwrap();
        assert!(state.has_pending_reply("f1.arc"));
        assert_eq!(
            state.take_pending_reply("f1.arc").unwrap(),
            Some(PendingReply::new("corr-1"))
        );
        assert!(!state.has_pending_reply("f1.arc"));
        assert!(state
            .set_pending_reply("unknown.arc", PendingReply::new("x"))
            .is_err());
    }

    #[test]
    fn test_insert_entry_indexes_records() {
        let mut entry = FileEntry::new("f1.arc", "chk1", None, ts(1)).unwrap();
        entry.set_replica_state(rid("KB"), UploadState::UploadCompleted, ts(3));
        let mut state = AdminState::new();
        state.insert_entry(entry).unwrap();
        assert_eq!(
            state.filenames_with_state("KB", UploadState::UploadCompleted),
            set(&["f1.arc"])
        );
        assert!(state.known_replicas().contains("KB"));
    }

    #[test]
    fn test_clear() {
        let mut state = AdminState::new();
        state.put_entry("f1.arc", "chk1", None, ts(1)).unwrap();
        state
            .set_replica_state("f1.arc", rid("BA1"), UploadState::UploadStarted, ts(1))
            .unwrap();
        state.clear();
        assert!(state.is_empty());
        assert!(state.known_replicas().is_empty());
        assert!(state
            .filenames_with_state("BA1", UploadState::UploadStarted)
            .is_empty());
    }
}
