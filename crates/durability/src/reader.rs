//! Admin file loader
//!
//! Reads the version header, then applies data lines to an `AdminState` in
//! file order. A file may name the same filename on many lines: later lines
//! update replica states of the entry created by the first one.
//!
//! Only I/O failures and an unknown version are fatal. Line defects are
//! recovered as follows and reported to the `LoadObserver`:
//!
//! | Defect | `0.4` | `0.3` |
//! |--------|-------|-------|
//! | bad first segment | line skipped | n/a |
//! | filename without checksum | n/a | existing entry dropped, else line skipped |
//! | checksum differs from loaded entry | entry dropped, line skipped | entry dropped |
//! | bad replica segment | segment skipped | whole entry dropped |

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use replica_admin_core::{FileEntry, Timestamp};
use replica_admin_storage::AdminState;

use crate::error::{DurabilityError, DurabilityResult};
use crate::format::{FormatVersion, LineDefect, LineRecord};
use crate::observer::{DropReason, LoadEvent, LoadObserver, TracingObserver};

/// Counters from one load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Grammar the file was read with
    pub version: FormatVersion,
    /// Data lines read, blank ones included
    pub lines_read: usize,
    /// Entries present after the load
    pub entries_loaded: usize,
    /// Lines ignored entirely
    pub lines_skipped: usize,
    /// Replica segments ignored
    pub segments_skipped: usize,
    /// Entries removed because of a malformed legacy line
    pub entries_dropped: usize,
    /// Entries removed because of a checksum conflict
    pub conflicts: usize,
}

impl LoadStats {
    fn new(version: FormatVersion) -> Self {
        LoadStats {
            version,
            lines_read: 0,
            entries_loaded: 0,
            lines_skipped: 0,
            segments_skipped: 0,
            entries_dropped: 0,
            conflicts: 0,
        }
    }

    /// Whether any line, segment or entry was discarded
    pub fn is_clean(&self) -> bool {
        self.lines_skipped == 0
            && self.segments_skipped == 0
            && self.entries_dropped == 0
            && self.conflicts == 0
    }
}

/// Loads admin files into an `AdminState`
#[derive(Clone)]
pub struct AdminReader {
    observer: Arc<dyn LoadObserver>,
}

impl Default for AdminReader {
    fn default() -> Self {
        AdminReader::new(Arc::new(TracingObserver))
    }
}

impl AdminReader {
    /// Create a reader reporting to `observer`
    pub fn new(observer: Arc<dyn LoadObserver>) -> Self {
        AdminReader { observer }
    }

    /// Load the file at `path` into `state`.
    ///
    /// `loaded_at` stamps replica records from legacy lines, which carry no
    /// timestamps.
    pub fn read_path(
        &self,
        path: &Path,
        state: &mut AdminState,
        loaded_at: Timestamp,
    ) -> DurabilityResult<LoadStats> {
        let file = File::open(path).map_err(|e| DurabilityError::io(path, e))?;
        let stats = self
            .read_from(BufReader::new(file), state, loaded_at)
            .map_err(|e| match e {
                DurabilityError::Stream(source) => DurabilityError::io(path, source),
                other => other,
            })?;
        debug!(
            target: "replica_admin::load",
            path = %path.display(),
            version = %stats.version,
            entries = stats.entries_loaded,
            "Loaded admin data"
        );
        Ok(stats)
    }

    /// Load admin data from any buffered source into `state`
    pub fn read_from<R: BufRead>(
        &self,
        mut reader: R,
        state: &mut AdminState,
        loaded_at: Timestamp,
    ) -> DurabilityResult<LoadStats> {
        let mut buf = Vec::new();
        let first = next_line(&mut reader, &mut buf)?;
        let version = FormatVersion::detect(first.as_deref())?;
        let mut stats = LoadStats::new(version);

        let mut line_no = 1;
        while let Some(line) = next_line(&mut reader, &mut buf)? {
            line_no += 1;
            stats.lines_read += 1;
            if line.trim().is_empty() {
                self.skip_line(line_no, LineDefect::Empty, &mut stats);
                continue;
            }
            match version {
                FormatVersion::Current => self.apply_current(line_no, &line, state, &mut stats),
                FormatVersion::Legacy => {
                    self.apply_legacy(line_no, &line, state, loaded_at, &mut stats)
                }
            }
        }

        stats.entries_loaded = state.len();
        Ok(stats)
    }

    fn emit(&self, event: LoadEvent) {
        self.observer.on_event(&event);
    }

    fn skip_line(&self, line: usize, defect: LineDefect, stats: &mut LoadStats) {
        stats.lines_skipped += 1;
        self.emit(LoadEvent::LineSkipped { line, defect });
    }

    /// Drop the entry when the line's checksum disagrees with it.
    /// Returns true if the line must not be applied further.
    fn resolve_conflict(
        &self,
        line: usize,
        record: &LineRecord,
        state: &mut AdminState,
        stats: &mut LoadStats,
    ) -> bool {
        let stored = match state.entry(&record.filename) {
            Some(entry) if entry.checksum() != record.checksum => entry.checksum().to_string(),
            _ => return false,
        };
        state.remove_entry(&record.filename);
        stats.conflicts += 1;
        self.emit(LoadEvent::ChecksumConflict {
            line,
            filename: record.filename.clone(),
            stored,
            found: record.checksum.clone(),
        });
        true
    }

    fn apply_current(&self, line: usize, text: &str, state: &mut AdminState, stats: &mut LoadStats) {
        let record = match FormatVersion::Current.parse_line(text) {
            Ok(record) => record,
            Err(defect) => return self.skip_line(line, defect, stats),
        };
        if self.resolve_conflict(line, &record, state, stats) {
            return;
        }
        if !state.has_entry(&record.filename) {
            let created = match record.head {
                Some(head) => FileEntry::with_state(&record.filename, &record.checksum, None, head),
                None => FileEntry::new(&record.filename, &record.checksum, None, Timestamp::EPOCH),
            };
            let inserted = created.and_then(|entry| state.insert_entry(entry).map(|_| ()));
            if inserted.is_err() {
                let defect = LineDefect::InvalidToken {
                    field: "filename",
                    value: record.filename,
                };
                return self.skip_line(line, defect, stats);
            }
        }

        for defect in record.defects {
            stats.segments_skipped += 1;
            self.emit(LoadEvent::SegmentSkipped {
                line,
                filename: record.filename.clone(),
                defect,
            });
        }
        for segment in record.replicas {
            let at = segment.at.unwrap_or(Timestamp::EPOCH);
            // The entry was checked or inserted above.
            let _ = state.set_replica_state(&record.filename, segment.replica, segment.state, at);
        }
    }

    fn apply_legacy(
        &self,
        line: usize,
        text: &str,
        state: &mut AdminState,
        loaded_at: Timestamp,
        stats: &mut LoadStats,
    ) {
        let record = match FormatVersion::Legacy.parse_line(text) {
            Ok(record) => record,
            Err(LineDefect::MissingChecksum { filename }) if state.has_entry(&filename) => {
                state.remove_entry(&filename);
                stats.entries_dropped += 1;
                return self.emit(LoadEvent::EntryDropped {
                    line,
                    filename,
                    reason: DropReason::MissingChecksum,
                });
            }
            Err(defect) => return self.skip_line(line, defect, stats),
        };
        if self.resolve_conflict(line, &record, state, stats) {
            return;
        }

        if !record.defects.is_empty() {
            let existed = state.remove_entry(&record.filename).is_some();
            for defect in record.defects {
                stats.segments_skipped += 1;
                self.emit(LoadEvent::SegmentSkipped {
                    line,
                    filename: record.filename.clone(),
                    defect,
                });
            }
            stats.entries_dropped += 1;
            debug!(
                target: "replica_admin::load",
                filename = %record.filename,
                existed,
                "Dropping legacy entry"
            );
            return self.emit(LoadEvent::EntryDropped {
                line,
                filename: record.filename,
                reason: DropReason::MalformedLegacyLine,
            });
        }

        if !state.has_entry(&record.filename)
            && state
                .put_entry(&record.filename, &record.checksum, None, loaded_at)
                .is_err()
        {
            let defect = LineDefect::InvalidToken {
                field: "filename",
                value: record.filename,
            };
            return self.skip_line(line, defect, stats);
        }
        for segment in record.replicas {
            let at = segment.at.unwrap_or(loaded_at);
            let _ = state.set_replica_state(&record.filename, segment.replica, segment.state, at);
        }
    }
}

/// Next line without its terminator, or `None` at end of input.
///
/// Invalid UTF-8 is replaced rather than failing the load.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> DurabilityResult<Option<String>> {
    buf.clear();
    let n = reader
        .read_until(b'\n', buf)
        .map_err(DurabilityError::Stream)?;
    if n == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
