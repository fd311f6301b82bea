//! Per-(file, replica) state
//!
//! A `ReplicaRecord` is created the first time a replica reports anything
//! about a file and is mutated by every later report for the same pair.
//! It is owned by its `FileEntry` and only disappears with it.
//!
//! Records loaded from the admin snapshot carry only the upload state and
//! its timestamp. Records built from bit-preservation table rows
//! (`ReplicaRecord::from_row`) also carry the table ids, the checksum the
//! replica reported and the audit statuses.

use crate::error::{Error, Result};
use crate::ids::ReplicaId;
use crate::state::{ChecksumStatus, FileListStatus, UploadState};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Numeric keys of a record in the bit-preservation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIds {
    /// Unique row id
    pub guid: u64,
    /// Id of the file in the file table
    pub file_id: u64,
    /// Id of the segment the file lives in within the replica; the tables
    /// use negative values for "no segment"
    pub segment_id: i64,
}

/// Raw bit-preservation row, as delivered by a database layer.
///
/// Values are unvalidated; `ReplicaRecord::from_row` checks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaFileRow {
    /// Unique row id
    pub guid: i64,
    /// Replica identifier
    pub replica_id: String,
    /// File table id
    pub file_id: i64,
    /// Segment id
    pub segment_id: i64,
    /// Checksum reported by the replica, if any
    pub checksum: Option<String>,
    /// Upload state ordinal
    pub upload_status: i32,
    /// Filelist status ordinal
    pub filelist_status: i32,
    /// Checksum status ordinal
    pub checksum_status: i32,
    /// Time of the last filelist audit
    pub filelist_checked_at: Option<Timestamp>,
    /// Time of the last checksum audit
    pub checksum_checked_at: Option<Timestamp>,
}

/// State of one file on one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    replica_id: ReplicaId,
    upload_state: UploadState,
    last_state_change: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ids: Option<RecordIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filelist_status: Option<FileListStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filelist_checked_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum_status: Option<ChecksumStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum_checked_at: Option<Timestamp>,
}

impl ReplicaRecord {
    /// Create a record with its first reported upload state
    pub fn new(replica_id: ReplicaId, state: UploadState, at: Timestamp) -> Self {
        ReplicaRecord {
            replica_id,
            upload_state: state,
            last_state_change: at,
            ids: None,
            checksum: None,
            filelist_status: None,
            filelist_checked_at: None,
            checksum_status: None,
            checksum_checked_at: None,
        }
    }

    /// Build a record from a bit-preservation table row.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `guid` or `file_id` is negative, the replica id is
    /// not a valid token, or a status ordinal is unknown. `segment_id` is
    /// taken as is.
    pub fn from_row(row: ReplicaFileRow) -> Result<Self> {
        let guid = non_negative("guid", row.guid)?;
        let file_id = non_negative("file_id", row.file_id)?;
        let replica_id = ReplicaId::new(row.replica_id)?;
        let upload_state = UploadState::from_ordinal(row.upload_status)?;
        let filelist_status = FileListStatus::from_ordinal(row.filelist_status)?;
        let checksum_status = ChecksumStatus::from_ordinal(row.checksum_status)?;

        // The table keeps no upload timestamp; the latest audit is the best
        // available approximation.
        let last_state_change = row
            .filelist_checked_at
            .max(row.checksum_checked_at)
            .unwrap_or(Timestamp::EPOCH);

        Ok(ReplicaRecord {
            replica_id,
            upload_state,
            last_state_change,
            ids: Some(RecordIds {
                guid,
                file_id,
                segment_id: row.segment_id,
            }),
            checksum: row.checksum,
            filelist_status,
            filelist_checked_at: row.filelist_checked_at,
            checksum_status,
            checksum_checked_at: row.checksum_checked_at,
        })
    }

    /// Overwrite the upload state unconditionally
    pub fn set_upload_state(&mut self, state: UploadState, at: Timestamp) {
        self.upload_state = state;
        self.last_state_change = at;
    }

    /// Overwrite the upload state from its snapshot name.
    ///
    /// # Errors
    ///
    /// `Format` if `name` is not one of the four state names; the record is
    /// left untouched.
    pub fn set_upload_state_named(&mut self, name: &str, at: Timestamp) -> Result<()> {
        let state = name.parse::<UploadState>()?;
        self.set_upload_state(state, at);
        Ok(())
    }

    /// Record the outcome of a filelist audit
    pub fn record_filelist_check(&mut self, status: FileListStatus, at: Timestamp) {
        self.filelist_status = Some(status);
        self.filelist_checked_at = Some(at);
    }

    /// Record the outcome of a checksum audit, with the checksum the replica reported
    pub fn record_checksum_check(
        &mut self,
        status: ChecksumStatus,
        reported: Option<String>,
        at: Timestamp,
    ) {
        self.checksum_status = Some(status);
        self.checksum_checked_at = Some(at);
        if reported.is_some() {
            self.checksum = reported;
        }
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    pub fn upload_state(&self) -> UploadState {
        self.upload_state
    }

    pub fn last_state_change(&self) -> Timestamp {
        self.last_state_change
    }

    pub fn ids(&self) -> Option<RecordIds> {
        self.ids
    }

    /// Checksum last reported by this replica, if any
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn filelist_status(&self) -> Option<FileListStatus> {
        self.filelist_status
    }

    pub fn filelist_checked_at(&self) -> Option<Timestamp> {
        self.filelist_checked_at
    }

    pub fn checksum_status(&self) -> Option<ChecksumStatus> {
        self.checksum_status
    }

    pub fn checksum_checked_at(&self) -> Option<Timestamp> {
        self.checksum_checked_at
    }
}

fn non_negative(what: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::invalid_argument(format!("{} must not be negative, got {}", what, value)))
}
