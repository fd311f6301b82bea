//! Textual admin snapshot format
//!
//! The admin file is line oriented. Line 1 is a version token; every other
//! line describes one file:
//!
//! ```text
//! 0.4
//! <filename> <checksum> <state> <millis>[,<replica> <state> <millis>]*
//! ```
//!
//! Version `0.3` lines have no entry-level state and no timestamps:
//!
//! ```text
//! 0.3
//! <filename> <checksum> [<replica> <state>]*
//! ```
//!
//! Both grammars are pure functions producing the same `LineRecord`; the
//! reader decides what to do with defects, because the recovery policy
//! differs between versions.
//!
//! # Module Structure
//!
//! - `current`: parser for `0.4` lines
//! - `legacy`: parser for `0.3` lines

pub mod current;
pub mod legacy;

use std::fmt;
use std::fmt::Write as _;

use replica_admin_core::{check_token, FileEntry, ReplicaId, StoreState, Timestamp, UploadState};

use crate::error::DurabilityError;

/// Version token of the format written by this crate
pub const CURRENT_VERSION: &str = "0.4";

/// Version token of the older, still readable format
pub const LEGACY_VERSION: &str = "0.3";

/// Separator between segments of a line
pub const SEGMENT_SEPARATOR: char = ',';

/// Separator between fields within a segment
pub const FIELD_DELIMITER: char = ' ';

/// Default name of the admin file inside the admin directory
pub const ADMIN_FILE_NAME: &str = "admin.data";

/// Grammar of an admin file, selected by its first line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// `0.3`: `filename checksum [replica state]*`
    Legacy,
    /// `0.4`: four-field first segment, timestamped replica segments
    Current,
}

impl FormatVersion {
    /// Detect the grammar from the first line of a file.
    ///
    /// An empty file (no first line) reads as legacy. Anything other than
    /// the two known tokens is fatal.
    pub fn detect(first_line: Option<&str>) -> Result<Self, DurabilityError> {
        match first_line.map(str::trim) {
            None => Ok(FormatVersion::Legacy),
            Some(CURRENT_VERSION) => Ok(FormatVersion::Current),
            Some(LEGACY_VERSION) => Ok(FormatVersion::Legacy),
            Some(other) => Err(DurabilityError::UnsupportedVersion(other.to_string())),
        }
    }

    /// The version token
    pub fn token(&self) -> &'static str {
        match self {
            FormatVersion::Legacy => LEGACY_VERSION,
            FormatVersion::Current => CURRENT_VERSION,
        }
    }

    /// Parse one data line with this version's grammar
    pub fn parse_line(&self, line: &str) -> Result<LineRecord, LineDefect> {
        match self {
            FormatVersion::Legacy => legacy::parse_line(line),
            FormatVersion::Current => current::parse_line(line),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One replica segment of a parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSegment {
    /// Replica the state belongs to
    pub replica: ReplicaId,
    /// Reported upload state
    pub state: UploadState,
    /// Time of the state change; `None` in the legacy grammar
    pub at: Option<Timestamp>,
}

/// A data line parsed by either grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// Filename (first field)
    pub filename: String,
    /// Reference checksum (second field)
    pub checksum: String,
    /// Entry-level state and timestamp; `None` in the legacy grammar
    pub head: Option<StoreState>,
    /// Well-formed replica segments, in line order
    pub replicas: Vec<ReplicaSegment>,
    /// Malformed replica segments, in line order
    pub defects: Vec<SegmentDefect>,
}

/// Why a whole line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineDefect {
    /// Line is empty
    #[error("empty line")]
    Empty,

    /// First segment has the wrong number of fields
    #[error("expected {expected} fields '<filename> <checksum> <state> <timestamp>' but found {found}")]
    HeadFieldCount {
        /// Fields required
        expected: usize,
        /// Fields present
        found: usize,
    },

    /// Line carries a filename but no checksum
    #[error("no checksum for file '{filename}'")]
    MissingChecksum {
        /// Filename of the line
        filename: String,
    },

    /// Filename or checksum is empty or contains whitespace
    #[error("invalid {field} '{value}'")]
    InvalidToken {
        /// Which field
        field: &'static str,
        /// Offending token
        value: String,
    },

    /// Entry-level state is not a known state name
    #[error("unknown state '{value}' for file '{filename}'")]
    HeadState {
        /// Filename of the line
        filename: String,
        /// Offending token
        value: String,
    },

    /// Entry-level timestamp is not an integer
    #[error("invalid timestamp '{value}' for file '{filename}'")]
    HeadTimestamp {
        /// Filename of the line
        filename: String,
        /// Offending token
        value: String,
    },
}

impl LineDefect {
    /// Filename named by the defective line, when one could be read
    pub fn filename(&self) -> Option<&str> {
        match self {
            LineDefect::MissingChecksum { filename }
            | LineDefect::HeadState { filename, .. }
            | LineDefect::HeadTimestamp { filename, .. } => Some(filename),
            LineDefect::Empty | LineDefect::HeadFieldCount { .. } | LineDefect::InvalidToken { .. } => {
                None
            }
        }
    }
}

/// Why a single replica segment could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentDefect {
    /// Segment has the wrong number of fields
    #[error("segment {index}: expected {expected} fields but found {found}")]
    FieldCount {
        /// Position of the segment on the line (0-based, replica segments only)
        index: usize,
        /// Fields required
        expected: usize,
        /// Fields present
        found: usize,
    },

    /// Replica id is not a valid token
    #[error("segment {index}: invalid replica id '{value}'")]
    ReplicaId {
        /// Position of the segment
        index: usize,
        /// Offending token
        value: String,
    },

    /// State is not a known state name
    #[error("segment {index}: unknown state '{value}'")]
    State {
        /// Position of the segment
        index: usize,
        /// Offending token
        value: String,
    },

    /// Timestamp is not an integer
    #[error("segment {index}: invalid timestamp '{value}'")]
    Timestamp {
        /// Position of the segment
        index: usize,
        /// Offending token
        value: String,
    },
}

/// Split on `sep`, dropping trailing empty pieces.
///
/// `"a b "` gives `["a", "b"]`; leading and inner empties are kept, so a
/// doubled delimiter still shows up as a wrong field count.
pub(crate) fn split_trimmed(s: &str, sep: char) -> Vec<&str> {
    let mut parts: Vec<&str> = s.split(sep).collect();
    while parts.last().map(|p| p.is_empty()).unwrap_or(false) {
        parts.pop();
    }
    parts
}

/// Validate the filename and checksum fields of a line
pub(crate) fn check_identity(filename: &str, checksum: &str) -> Result<(), LineDefect> {
    for (field, value) in [("filename", filename), ("checksum", checksum)] {
        if check_token(field, value).is_err() {
            return Err(LineDefect::InvalidToken {
                field,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Parse one replica segment's fields; `at` is only present in `0.4`.
pub(crate) fn parse_segment(
    index: usize,
    replica: &str,
    state: &str,
    at: Option<&str>,
) -> Result<ReplicaSegment, SegmentDefect> {
    let replica = ReplicaId::new(replica).map_err(|_| SegmentDefect::ReplicaId {
        index,
        value: replica.to_string(),
    })?;
    let state = state.parse::<UploadState>().map_err(|_| SegmentDefect::State {
        index,
        value: state.to_string(),
    })?;
    let at = match at {
        Some(raw) => Some(raw.parse::<Timestamp>().map_err(|_| SegmentDefect::Timestamp {
            index,
            value: raw.to_string(),
        })?),
        None => None,
    };
    Ok(ReplicaSegment { replica, state, at })
}

/// Render an entry as one `0.4` line, without the trailing newline.
///
/// Replica segments are ordered by replica id.
pub fn format_entry(entry: &FileEntry) -> String {
    let general = entry.general_state();
    let mut line = format!(
        "{}{d}{}{d}{}{d}{}",
        entry.filename(),
        entry.checksum(),
        general.state,
        general.at.as_millis(),
        d = FIELD_DELIMITER
    );
    for record in entry.replica_records() {
        // Writing to a String cannot fail.
        let _ = write!(
            line,
            "{s}{}{d}{}{d}{}",
            record.replica_id(),
            record.upload_state(),
            record.last_state_change().as_millis(),
            s = SEGMENT_SEPARATOR,
            d = FIELD_DELIMITER
        );
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_version() {
        assert_eq!(FormatVersion::detect(Some("0.4")).unwrap(), FormatVersion::Current);
        assert_eq!(FormatVersion::detect(Some("0.3")).unwrap(), FormatVersion::Legacy);
        assert_eq!(FormatVersion::detect(Some("0.4\r")).unwrap(), FormatVersion::Current);
        assert_eq!(FormatVersion::detect(None).unwrap(), FormatVersion::Legacy);
        assert!(matches!(
            FormatVersion::detect(Some("0.5")),
            Err(DurabilityError::UnsupportedVersion(v)) if v == "0.5"
        ));
        assert!(FormatVersion::detect(Some("f1.arc chk")).is_err());
    }

    #[test]
    fn test_split_trimmed() {
        assert_eq!(split_trimmed("a b ", ' '), vec!["a", "b"]);
        assert_eq!(split_trimmed("a  b", ' '), vec!["a", "", "b"]);
        assert_eq!(split_trimmed(" a", ' '), vec!["", "a"]);
        assert!(split_trimmed("", ' ').is_empty());
        assert_eq!(split_trimmed("x,", ','), vec!["x"]);
    }

    #[test]
    fn test_format_entry() {
        let mut entry = FileEntry::with_state(
            "f1.arc",
            "chk1",
            None,
            StoreState::new(UploadState::UploadStarted, Timestamp::from_millis(5)),
        )
        .unwrap();
        assert_eq!(format_entry(&entry), "f1.arc chk1 UPLOAD_STARTED 5");

        entry.set_replica_state(
            ReplicaId::new("BA2").unwrap(),
            UploadState::UploadCompleted,
            Timestamp::from_millis(2000),
        );
        entry.set_replica_state(
            ReplicaId::new("BA1").unwrap(),
            UploadState::UploadCompleted,
            Timestamp::from_millis(1000),
        );
        assert_eq!(
            format_entry(&entry),
            "f1.arc chk1 UPLOAD_COMPLETED 1000,BA1 UPLOAD_COMPLETED 1000,BA2 UPLOAD_COMPLETED 2000"
        );
    }

    #[test]
    fn test_defect_filename() {
        let d = LineDefect::MissingChecksum {
            filename: "f.arc".to_string(),
        };
        assert_eq!(d.filename(), Some("f.arc"));
        assert_eq!(
            LineDefect::HeadFieldCount {
                expected: 4,
                found: 2
            }
            .filename(),
            None
        );
    }
}
