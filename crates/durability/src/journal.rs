//! Append journal on the admin file
//!
//! Every mutation appends the complete current line of the touched entry to
//! the admin file. The loader already folds repeated lines for one filename
//! into a single entry, so the journal needs no format of its own: the admin
//! file is always a valid `0.4` snapshot, possibly with redundant lines that
//! the next checkpoint compacts away.
//!
//! Removals and checksum corrections cannot be expressed as an appended line
//! and are persisted by rewriting the snapshot instead.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use replica_admin_core::FileEntry;

use crate::config::SyncMode;
use crate::error::{DurabilityError, DurabilityResult};
use crate::format::{format_entry, CURRENT_VERSION};

/// Appends entry lines to an admin file
#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    sync: SyncMode,
    appended: u64,
    /// A write failed and may have left a partial line behind
    torn: bool,
}

impl JournalWriter {
    /// Open `path` for appending, creating it with a version line if it is
    /// missing or empty.
    pub fn open(path: impl Into<PathBuf>, sync: SyncMode) -> DurabilityResult<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| DurabilityError::io(&path, e))?;
        let len = file
            .metadata()
            .map_err(|e| DurabilityError::io(&path, e))?
            .len();
        let prefix = if len == 0 {
            Some(format!("{}\n", CURRENT_VERSION))
        } else if last_byte(&mut file, len).map_err(|e| DurabilityError::io(&path, e))? != b'\n' {
            // Hand-edited files may lack a final newline.
            Some("\n".to_string())
        } else {
            None
        };
        if let Some(prefix) = prefix {
            file.write_all(prefix.as_bytes())
                .and_then(|_| file.sync_data())
                .map_err(|e| DurabilityError::io(&path, e))?;
        }
        Ok(JournalWriter {
            path,
            file,
            sync,
            appended: 0,
            torn: false,
        })
    }

    /// Append the current line of `entry`.
    ///
    /// After a failed write the next append first terminates whatever
    /// partial line the failure left, so the new line stays readable.
    pub fn append(&mut self, entry: &FileEntry) -> DurabilityResult<()> {
        let mut line = String::new();
        if self.torn && self.ends_mid_line().map_err(|e| DurabilityError::io(&self.path, e))? {
            line.push('\n');
        }
        line.push_str(&format_entry(entry));
        line.push('\n');
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            self.torn = true;
            return Err(DurabilityError::io(&self.path, e));
        }
        self.torn = false;
        if self.sync.requires_immediate_fsync() {
            self.sync()?;
        }
        self.appended += 1;
        trace!(target: "replica_admin::journal", filename = entry.filename(), "Appended admin line");
        Ok(())
    }

    /// Force appended lines to disk
    pub fn sync(&mut self) -> DurabilityResult<()> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_data())
            .map_err(|e| DurabilityError::io(&self.path, e))
    }

    /// File being appended to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync mode in effect
    pub fn sync_mode(&self) -> SyncMode {
        self.sync
    }

    /// Lines appended since this writer was opened
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

impl JournalWriter {
    fn ends_mid_line(&mut self) -> io::Result<bool> {
        let len = self.file.metadata()?.len();
        Ok(len > 0 && last_byte(&mut self.file, len)? != b'\n')
    }
}

fn last_byte(file: &mut File, len: u64) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut byte)?;
    Ok(byte[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::AdminReader;
    use replica_admin_core::{ReplicaId, Timestamp, UploadState};
    use replica_admin_storage::AdminState;
    use tempfile::TempDir;

    #[test]
    fn test_new_file_gets_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        let mut journal = JournalWriter::open(&path, SyncMode::Always).unwrap();
        let entry = FileEntry::new("f.arc", "c", None, Timestamp::from_millis(3)).unwrap();
        journal.append(&entry).unwrap();
        assert_eq!(journal.appended(), 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0.4\nf.arc c UPLOAD_STARTED 3\n"
        );
    }

    #[test]
    fn test_reopen_does_not_repeat_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        let entry = FileEntry::new("f.arc", "c", None, Timestamp::from_millis(3)).unwrap();
        JournalWriter::open(&path, SyncMode::Buffered)
            .unwrap()
            .append(&entry)
            .unwrap();
        let mut journal = JournalWriter::open(&path, SyncMode::Buffered).unwrap();
        journal.append(&entry).unwrap();
        journal.sync().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("0.4").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_missing_final_newline_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        std::fs::write(&path, "0.4\na.arc c UPLOAD_STARTED 1").unwrap();
        let mut journal = JournalWriter::open(&path, SyncMode::Always).unwrap();
        let entry = FileEntry::new("b.arc", "c", None, Timestamp::from_millis(2)).unwrap();
        journal.append(&entry).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0.4\na.arc c UPLOAD_STARTED 1\nb.arc c UPLOAD_STARTED 2\n"
        );
    }

    #[test]
    fn test_partial_line_after_failed_write_is_terminated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        let mut journal = JournalWriter::open(&path, SyncMode::Always).unwrap();
        journal
            .append(&FileEntry::new("a.arc", "c", None, Timestamp::from_millis(1)).unwrap())
            .unwrap();

        // a write that died halfway through a line
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"b.arc c UPLO")
            .unwrap();
        journal.torn = true;

        journal
            .append(&FileEntry::new("c.arc", "c", None, Timestamp::from_millis(3)).unwrap())
            .unwrap();
        assert!(!journal.torn);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0.4\na.arc c UPLOAD_STARTED 1\nb.arc c UPLO\nc.arc c UPLOAD_STARTED 3\n"
        );

        let mut state = AdminState::new();
        AdminReader::default()
            .read_path(&path, &mut state, Timestamp::EPOCH)
            .unwrap();
        assert!(state.has_entry("a.arc"));
        assert!(!state.has_entry("b.arc"));
        assert!(state.has_entry("c.arc"));
    }

    #[test]
    fn test_failed_write_with_nothing_written_adds_no_blank_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        let mut journal = JournalWriter::open(&path, SyncMode::Always).unwrap();
        journal.torn = true;
        journal
            .append(&FileEntry::new("a.arc", "c", None, Timestamp::from_millis(1)).unwrap())
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0.4\na.arc c UPLOAD_STARTED 1\n"
        );
    }

    #[test]
    fn test_appended_lines_fold_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.data");
        let mut journal = JournalWriter::open(&path, SyncMode::Always).unwrap();

        let mut entry = FileEntry::new("f.arc", "c", None, Timestamp::from_millis(1)).unwrap();
        journal.append(&entry).unwrap();
        entry.set_replica_state(
            ReplicaId::new("BA1").unwrap(),
            UploadState::DataUploaded,
            Timestamp::from_millis(2),
        );
        journal.append(&entry).unwrap();
        entry.set_replica_state(
            ReplicaId::new("BA1").unwrap(),
            UploadState::UploadCompleted,
            Timestamp::from_millis(3),
        );
        journal.append(&entry).unwrap();

        let mut state = AdminState::new();
        let stats = AdminReader::default()
            .read_path(&path, &mut state, Timestamp::EPOCH)
            .unwrap();
        assert!(stats.is_clean());
        assert_eq!(stats.lines_read, 3);
        assert_eq!(state.len(), 1);
        assert_eq!(state.state("f.arc", "BA1").unwrap(), UploadState::UploadCompleted);
    }
}
