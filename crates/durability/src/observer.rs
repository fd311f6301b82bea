//! Load diagnostics
//!
//! Loading never fails on a bad data line. Every recovery decision the
//! reader takes is reported as a `LoadEvent` so callers can log, count or
//! assert on it.

use tracing::warn;

use crate::format::{LineDefect, SegmentDefect};

/// Why an existing entry was discarded while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Legacy line named the file without a checksum
    MissingChecksum,
    /// Legacy line had an unpaired field or an invalid replica pair
    MalformedLegacyLine,
}

/// A recovery decision taken while loading an admin file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// Whole line ignored
    LineSkipped {
        /// 1-based line number in the file
        line: usize,
        /// What was wrong
        defect: LineDefect,
    },

    /// One replica segment ignored; the rest of the line was applied
    SegmentSkipped {
        /// 1-based line number
        line: usize,
        /// File the segment belongs to
        filename: String,
        /// What was wrong
        defect: SegmentDefect,
    },

    /// A line disagreed with the checksum already loaded for its file. The
    /// entry was removed and the line ignored.
    ChecksumConflict {
        /// 1-based line number
        line: usize,
        /// File in conflict
        filename: String,
        /// Checksum loaded from earlier lines
        stored: String,
        /// Checksum on this line
        found: String,
    },

    /// An entry was removed because of a malformed legacy line
    EntryDropped {
        /// 1-based line number
        line: usize,
        /// File removed
        filename: String,
        /// Why
        reason: DropReason,
    },
}

/// Receiver of load diagnostics
pub trait LoadObserver: Send + Sync {
    /// Called once per recovery decision, in file order
    fn on_event(&self, event: &LoadEvent);
}

impl<F> LoadObserver for F
where
    F: Fn(&LoadEvent) + Send + Sync,
{
    fn on_event(&self, event: &LoadEvent) {
        self(event)
    }
}

/// Observer that logs every event as a warning
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::LineSkipped { line, defect } => {
                warn!(target: "replica_admin::load", line, %defect, "Skipping malformed admin line");
            }
            LoadEvent::SegmentSkipped {
                line,
                filename,
                defect,
            } => {
                warn!(
                    target: "replica_admin::load",
                    line,
                    filename = %filename,
                    %defect,
                    "Skipping malformed replica segment"
                );
            }
            LoadEvent::ChecksumConflict {
                line,
                filename,
                stored,
                found,
            } => {
                warn!(
                    target: "replica_admin::load",
                    line,
                    filename = %filename,
                    stored = %stored,
                    found = %found,
                    "Conflicting checksums, removing admin entry"
                );
            }
            LoadEvent::EntryDropped {
                line,
                filename,
                reason,
            } => {
                warn!(
                    target: "replica_admin::load",
                    line,
                    filename = %filename,
                    ?reason,
                    "Removing admin entry for malformed legacy line"
                );
            }
        }
    }
}
