//! Core types for replica admin data
//!
//! This crate defines the foundational types used throughout the system:
//! - ReplicaId: validated replica identifier
//! - Timestamp: millisecond-precision point in time
//! - UploadState, FileListStatus, ChecksumStatus: per-replica status enums
//! - ReplicaRecord: state of one file on one replica
//! - FileEntry: reference checksum plus replica records of one file
//! - Error: error taxonomy for runtime operations

#![warn(clippy::all)]

pub mod error;
pub mod file_entry;
pub mod ids;
pub mod replica_record;
pub mod state;
pub mod timestamp;

pub use error::{Error, Result};
pub use file_entry::{FileEntry, PendingReply, StoreState};
pub use ids::{check_token, ReplicaId};
pub use replica_record::{RecordIds, ReplicaFileRow, ReplicaRecord};
pub use state::{ChecksumStatus, FileListStatus, UploadState};
pub use timestamp::Timestamp;
