//! Upload and audit status enums
//!
//! `UploadState` is the four-state lifecycle of storing a file copy on one
//! replica. Its textual names are part of the admin snapshot format and
//! its ordinals are those used by the bit-preservation tables.
//!
//! `FileListStatus` and `ChecksumStatus` record the outcome of the last
//! filelist and checksum audit of a replica copy. "Not checked yet" is
//! modelled as `None` on the owning record, not as a variant.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a file copy on a single replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    /// Upload to the replica has been requested
    UploadStarted,
    /// The data has arrived at the replica, checksum not yet confirmed
    DataUploaded,
    /// The replica holds a confirmed copy
    UploadCompleted,
    /// The upload failed
    UploadFailed,
}

impl UploadState {
    /// All states in ordinal order
    pub const ALL: [UploadState; 4] = [
        UploadState::UploadStarted,
        UploadState::DataUploaded,
        UploadState::UploadCompleted,
        UploadState::UploadFailed,
    ];

    /// Name as written in the admin snapshot
    pub const fn as_str(&self) -> &'static str {
        match self {
            UploadState::UploadStarted => "UPLOAD_STARTED",
            UploadState::DataUploaded => "DATA_UPLOADED",
            UploadState::UploadCompleted => "UPLOAD_COMPLETED",
            UploadState::UploadFailed => "UPLOAD_FAILED",
        }
    }

    /// Ordinal used by the bit-preservation tables
    pub const fn ordinal(&self) -> i32 {
        match self {
            UploadState::UploadStarted => 0,
            UploadState::DataUploaded => 1,
            UploadState::UploadCompleted => 2,
            UploadState::UploadFailed => 3,
        }
    }

    /// Map a table ordinal back to a state
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        UploadState::ALL
            .iter()
            .copied()
            .find(|s| s.ordinal() == ordinal)
            .ok_or_else(|| Error::invalid_argument(format!("unknown upload state ordinal {}", ordinal)))
    }

    /// Position on the success path; `None` for `UploadFailed`.
    pub(crate) const fn progress(&self) -> Option<u8> {
        match self {
            UploadState::UploadStarted => Some(0),
            UploadState::DataUploaded => Some(1),
            UploadState::UploadCompleted => Some(2),
            UploadState::UploadFailed => None,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UploadState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::format(format!("unknown upload state '{}'", s)))
    }
}

/// Outcome of the last filelist audit of a replica copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileListStatus {
    /// File was present in the replica's file list
    Ok,
    /// File was missing from, or inconsistent in, the file list
    Corrupt,
}

/// Outcome of the last checksum audit of a replica copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksumStatus {
    /// Replica checksum matched the reference checksum
    Ok,
    /// Replica checksum differed from the reference checksum
    Corrupt,
}

macro_rules! audit_status_ordinals {
    ($ty:ident) => {
        impl $ty {
            /// Map a table ordinal: 0 = not checked, 1 = corrupt, 2 = ok
            pub fn from_ordinal(ordinal: i32) -> Result<Option<Self>> {
                match ordinal {
                    0 => Ok(None),
                    1 => Ok(Some($ty::Corrupt)),
                    2 => Ok(Some($ty::Ok)),
                    other => Err(Error::invalid_argument(format!(
                        "unknown {} ordinal {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }

            /// Table ordinal of this status
            pub const fn ordinal(&self) -> i32 {
                match self {
                    $ty::Corrupt => 1,
                    $ty::Ok => 2,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $ty::Ok => f.write_str("OK"),
                    $ty::Corrupt => f.write_str("CORRUPT"),
                }
            }
        }
    };
}

audit_status_ordinals!(FileListStatus);
audit_status_ordinals!(ChecksumStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for state in UploadState::ALL {
            assert_eq!(state.as_str().parse::<UploadState>().unwrap(), state);
        }
    }

    #[test]
    fn test_unknown_name_is_format_error() {
        let err = "UPLOAD_DONE".parse::<UploadState>().unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        // names are case sensitive
        assert!("upload_completed".parse::<UploadState>().is_err());
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(UploadState::from_ordinal(2).unwrap(), UploadState::UploadCompleted);
        assert_eq!(UploadState::from_ordinal(3).unwrap(), UploadState::UploadFailed);
        assert!(matches!(UploadState::from_ordinal(7), Err(Error::InvalidArgument(_))));
        assert!(UploadState::from_ordinal(-1).is_err());
    }

    #[test]
    fn test_audit_ordinals() {
        assert_eq!(ChecksumStatus::from_ordinal(0).unwrap(), None);
        assert_eq!(ChecksumStatus::from_ordinal(1).unwrap(), Some(ChecksumStatus::Corrupt));
        assert_eq!(FileListStatus::from_ordinal(2).unwrap(), Some(FileListStatus::Ok));
        assert!(FileListStatus::from_ordinal(3).is_err());
        assert_eq!(FileListStatus::Corrupt.ordinal(), 1);
    }

    #[test]
    fn test_serde_uses_snapshot_names() {
        let json = serde_json::to_string(&UploadState::DataUploaded).unwrap();
        assert_eq!(json, "\"DATA_UPLOADED\"");
        assert_eq!(ChecksumStatus::Ok.to_string(), "OK");
    }
}
