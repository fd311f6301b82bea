//! Per-file aggregate
//!
//! A `FileEntry` holds the reference checksum of one archived file, the
//! state of each replica copy, and optionally the pending reply of the store
//! request that registered it. All replica records are assumed to describe
//! the same content; a reference checksum never changes in place (a
//! correction replaces the whole entry at the store level).

use crate::error::Result;
use crate::ids::{check_token, ReplicaId};
use crate::replica_record::ReplicaRecord;
use crate::state::UploadState;
use crate::timestamp::Timestamp;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque correlation token for an in-flight store request.
///
/// Produced and consumed by the messaging layer; never persisted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PendingReply(String);

impl PendingReply {
    pub fn new(token: impl Into<String>) -> Self {
        PendingReply(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingReply({})", self.0)
    }
}

/// Entry-level state: a state plus the moment it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreState {
    pub state: UploadState,
    pub at: Timestamp,
}

impl StoreState {
    pub fn new(state: UploadState, at: Timestamp) -> Self {
        StoreState { state, at }
    }
}

/// Admin record of one archived file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    filename: String,
    checksum: String,
    initial: StoreState,
    pending_reply: Option<PendingReply>,
    replicas: BTreeMap<ReplicaId, ReplicaRecord>,
}

impl FileEntry {
    /// Create an entry in state `UPLOAD_STARTED` at `at`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the filename or checksum is not a valid token.
    pub fn new(
        filename: impl Into<String>,
        checksum: impl Into<String>,
        pending_reply: Option<PendingReply>,
        at: Timestamp,
    ) -> Result<Self> {
        Self::with_state(
            filename,
            checksum,
            pending_reply,
            StoreState::new(UploadState::UploadStarted, at),
        )
    }

    /// Create an entry with an explicit entry-level state, as parsed from the
    /// first segment of a snapshot line.
    pub fn with_state(
        filename: impl Into<String>,
        checksum: impl Into<String>,
        pending_reply: Option<PendingReply>,
        initial: StoreState,
    ) -> Result<Self> {
        let filename = filename.into();
        let checksum = checksum.into();
        check_token("filename", &filename)?;
        check_token("checksum", &checksum)?;
        Ok(FileEntry {
            filename,
            checksum,
            initial,
            pending_reply,
            replicas: BTreeMap::new(),
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Reference checksum
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn has_replica_record(&self, replica: &str) -> bool {
        self.replicas.contains_key(replica)
    }

    pub fn replica_record(&self, replica: &str) -> Option<&ReplicaRecord> {
        self.replicas.get(replica)
    }

    /// Records ordered by replica id
    pub fn replica_records(&self) -> impl Iterator<Item = &ReplicaRecord> {
        self.replicas.values()
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Set the upload state of `replica`, creating its record if absent.
    ///
    /// Returns the previous state, if the record already existed.
    pub fn set_replica_state(
        &mut self,
        replica: ReplicaId,
        state: UploadState,
        at: Timestamp,
    ) -> Option<UploadState> {
        match self.replicas.get_mut(replica.as_str()) {
            Some(record) => {
                let previous = record.upload_state();
                record.set_upload_state(state, at);
                Some(previous)
            }
            None => {
                self.replicas
                    .insert(replica.clone(), ReplicaRecord::new(replica, state, at));
                None
            }
        }
    }

    /// Insert a fully built record, replacing any record for the same replica
    pub fn insert_replica_record(&mut self, record: ReplicaRecord) -> Option<ReplicaRecord> {
        self.replicas.insert(record.replica_id().clone(), record)
    }

    pub fn has_pending_reply(&self) -> bool {
        self.pending_reply.is_some()
    }

    pub fn pending_reply(&self) -> Option<&PendingReply> {
        self.pending_reply.as_ref()
    }

    pub fn set_pending_reply(&mut self, reply: PendingReply) {
        self.pending_reply = Some(reply);
    }

    /// Remove and return the pending reply
    pub fn clear_pending_reply(&mut self) -> Option<PendingReply> {
        self.pending_reply.take()
    }

    /// Entry-level state, as written in the first segment of a snapshot line.
    ///
    /// Any failed replica makes the entry failed (latest failure wins).
    /// Otherwise the entry is as far as its least advanced replica. An entry
    /// without replica records keeps the state it was created with.
    pub fn general_state(&self) -> StoreState {
        let failed = self
            .replicas
            .values()
            .filter(|r| r.upload_state() == UploadState::UploadFailed)
            .map(|r| r.last_state_change())
            .max();
        if let Some(at) = failed {
            return StoreState::new(UploadState::UploadFailed, at);
        }

        self.replicas
            .values()
            .filter_map(|r| r.upload_state().progress().map(|p| (p, r)))
            .min_by_key(|(p, r)| (*p, r.last_state_change()))
            .map(|(_, r)| StoreState::new(r.upload_state(), r.last_state_change()))
            .unwrap_or(self.initial)
    }
}
