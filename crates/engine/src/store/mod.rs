//! AdminStore struct and open/close logic
//!
//! The store owns one `AdminState` behind a `parking_lot::RwLock`:
//! - Queries take the read lock and may run concurrently
//! - Every mutation, including its journal append or snapshot rewrite,
//!   runs under the write lock
//!
//! ## Access modes
//!
//! | Mode | Lock file | Writes | Refresh |
//! |------|-----------|--------|---------|
//! | ReadWrite | exclusive `.lock` | journal + snapshots | no-op |
//! | ReadOnly | none | rejected with `Error::ReadOnly` | reload when the file changed |
//!
//! ## Persistence
//!
//! `put_entry` and `set_replica_state` append the entry's full line to the
//! admin file before the change is applied in memory. `remove_entry` and
//! `correct_checksum` rewrite the file as a snapshot and revert the
//! in-memory change if the rewrite fails before the new file is in place.
//! `checkpoint` compacts the journal into a fresh snapshot.
//!
//! If the journal cannot be reopened after a snapshot replaced the file,
//! the store keeps no journal and refuses `put_entry` and
//! `set_replica_state` until a `checkpoint` succeeds.

mod builder;

pub use builder::AdminStoreBuilder;

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use replica_admin_core::{
    check_token, Error, FileEntry, PendingReply, ReplicaId, Result, StoreState, Timestamp, UploadState,
};
use replica_admin_durability::{
    AdminConfig, AdminReader, FormatVersion, JournalWriter, LoadStats, SnapshotWriter,
};
use replica_admin_storage::{AdminState, ConsistencyReport, ConsistencyView};

/// How a store may touch its admin file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Single writer: journal and snapshot writes, exclusive lock
    #[default]
    ReadWrite,
    /// Observer of a file owned by another process; never writes
    ReadOnly,
}

/// On-disk side of a store
struct Backing {
    path: PathBuf,
    reader: AdminReader,
    snapshot: SnapshotWriter,
    config: AdminConfig,
}

struct Inner {
    state: AdminState,
    journal: Option<JournalWriter>,
    last_load: Option<LoadStats>,
    loaded_stamp: Option<FileStamp>,
}

/// Modification time and length of the admin file at the last load
type FileStamp = (SystemTime, u64);

/// How far a failed snapshot rewrite got
enum RewriteError {
    /// The old admin file is still in place
    Aborted(Error),
    /// The new snapshot replaced the admin file
    Applied(Error),
}

impl From<RewriteError> for Error {
    fn from(e: RewriteError) -> Self {
        match e {
            RewriteError::Aborted(e) | RewriteError::Applied(e) => e,
        }
    }
}

/// Shared, mode-selected admin store
///
/// Open a disk-backed store with [`AdminStore::open`] or
/// [`AdminStore::builder`]; use [`AdminStore::ephemeral`] for a store with
/// no files.
///
/// # Example
///
/// ```text
/// use replica_admin_engine::{AdminStore, AccessMode};
///
/// let store = AdminStore::open("/var/lib/replica-admin")?;
/// store.put_entry("f1.arc", "chk1", None)?;
/// store.set_replica_state("f1.arc", ReplicaId::new("BA1")?, UploadState::UploadCompleted, Timestamp::now())?;
/// ```
pub struct AdminStore {
    inner: RwLock<Inner>,
    mode: AccessMode,
    backing: Option<Backing>,
    // Held for the lifetime of a read-write store; closing it releases the lock.
    _lock_file: Option<File>,
}

impl AdminStore {
    /// Builder for a disk-backed store
    pub fn builder() -> AdminStoreBuilder {
        AdminStoreBuilder::new()
    }

    /// Open the admin directory `dir` read-write with its `admin.toml`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        AdminStoreBuilder::new().path(dir.as_ref()).open()
    }

    /// Open the admin directory `dir` read-only
    pub fn open_read_only<P: AsRef<Path>>(dir: P) -> Result<Self> {
        AdminStoreBuilder::new().path(dir.as_ref()).read_only().open()
    }

    /// In-memory read-write store with no files
    pub fn ephemeral() -> Self {
        AdminStore {
            inner: RwLock::new(Inner {
                state: AdminState::new(),
                journal: None,
                last_load: None,
                loaded_stamp: None,
            }),
            mode: AccessMode::ReadWrite,
            backing: None,
            _lock_file: None,
        }
    }

    /// Load the admin file and assemble the store. Called by the builder
    /// once the directory, config and lock are settled.
    pub(crate) fn load(
        path: PathBuf,
        mode: AccessMode,
        config: AdminConfig,
        reader: AdminReader,
        lock_file: Option<File>,
    ) -> Result<Self> {
        let snapshot = SnapshotWriter::new(&path);
        let mut state = AdminState::new();
        let mut last_load = None;

        if path.exists() {
            let stats = reader.read_path(&path, &mut state, Timestamp::now())?;
            info!(
                target: "replica_admin::store",
                path = %path.display(),
                version = %stats.version,
                lines = stats.lines_read,
                entries = stats.entries_loaded,
                lines_skipped = stats.lines_skipped,
                segments_skipped = stats.segments_skipped,
                entries_dropped = stats.entries_dropped,
                conflicts = stats.conflicts,
                "Admin data loaded"
            );
            last_load = Some(stats);
        } else if mode == AccessMode::ReadOnly {
            warn!(target: "replica_admin::store", path = %path.display(), "Admin data file not found");
        }

        let mut journal = None;
        if mode == AccessMode::ReadWrite {
            if snapshot.cleanup_temp_file().map_err(Error::Io)? {
                debug!(target: "replica_admin::store", "Removed stale snapshot temp file");
            }
            let legacy = last_load.map(|s| s.version == FormatVersion::Legacy).unwrap_or(false);
            if legacy {
                snapshot.write_atomic(&state)?;
                info!(
                    target: "replica_admin::store",
                    path = %path.display(),
                    "Upgraded legacy admin data to the current format"
                );
            }
            journal = Some(JournalWriter::open(&path, config.sync)?);
        }

        let loaded_stamp = file_stamp(&path);
        Ok(AdminStore {
            inner: RwLock::new(Inner {
                state,
                journal,
                last_load,
                loaded_stamp,
            }),
            mode,
            backing: Some(Backing {
                path,
                reader,
                snapshot,
                config,
            }),
            _lock_file: lock_file,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Access mode chosen at open
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether mutations are rejected
    pub fn is_read_only(&self) -> bool {
        self.mode == AccessMode::ReadOnly
    }

    /// Admin data file, `None` for an ephemeral store
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_ref().map(|b| b.path.as_path())
    }

    /// Configuration in effect, `None` for an ephemeral store
    pub fn config(&self) -> Option<&AdminConfig> {
        self.backing.as_ref().map(|b| &b.config)
    }

    /// Statistics of the most recent load from disk
    pub fn last_load_stats(&self) -> Option<LoadStats> {
        self.inner.read().last_load
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Live read-only view holding the read lock until dropped
    pub fn view(&self) -> ConsistencyView<MappedRwLockReadGuard<'_, AdminState>> {
        ConsistencyView::new(RwLockReadGuard::map(self.inner.read(), |inner| &inner.state))
    }

    /// Consistency report over the current state
    pub fn report(&self) -> ConsistencyReport {
        self.view().report()
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.inner.read().state.len()
    }

    /// Whether no file is registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().state.is_empty()
    }

    /// Whether `filename` is registered
    pub fn has_entry(&self, filename: &str) -> bool {
        self.inner.read().state.has_entry(filename)
    }

    /// Copy of the entry for `filename`
    pub fn entry(&self, filename: &str) -> Result<FileEntry> {
        self.inner.read().state.get_entry(filename).cloned()
    }

    /// Every registered filename
    pub fn all_filenames(&self) -> HashSet<String> {
        self.inner.read().state.all_filenames()
    }

    /// Filenames in `state` on `replica`; empty when nothing matches
    pub fn filenames_with_state(&self, replica: &str, state: UploadState) -> HashSet<String> {
        self.inner.read().state.filenames_with_state(replica, state)
    }

    /// Reference checksum of `filename`
    pub fn checksum(&self, filename: &str) -> Result<String> {
        self.inner.read().state.checksum(filename).map(str::to_string)
    }

    /// Whether `replica` has reported a state for `filename`
    pub fn has_state(&self, filename: &str, replica: &str) -> bool {
        self.inner.read().state.has_state(filename, replica)
    }

    /// Upload state of `filename` on `replica`
    pub fn state(&self, filename: &str, replica: &str) -> Result<UploadState> {
        self.inner.read().state.state(filename, replica)
    }

    /// Entry-level state of `filename`
    pub fn general_state(&self, filename: &str) -> Result<StoreState> {
        self.inner
            .read()
            .state
            .get_entry(filename)
            .map(FileEntry::general_state)
    }

    /// Every replica that has reported a state
    pub fn known_replicas(&self) -> BTreeSet<ReplicaId> {
        self.inner.read().state.known_replicas().clone()
    }

    /// Whether a pending reply is attached to `filename`
    pub fn has_reply_info(&self, filename: &str) -> bool {
        self.inner.read().state.has_pending_reply(filename)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Journal to append to: `None` for an ephemeral store, an error for a
    /// backed store whose journal was lost in a failed rewrite
    fn journal<'a>(
        &self,
        journal: &'a mut Option<JournalWriter>,
    ) -> Result<Option<&'a mut JournalWriter>> {
        match (&self.backing, journal.as_mut()) {
            (None, _) => Ok(None),
            (Some(_), Some(journal)) => Ok(Some(journal)),
            (Some(backing), None) => Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "admin journal on '{}' is closed after a failed rewrite; checkpoint to reopen it",
                    backing.path.display()
                ),
            ))),
        }
    }

    fn ensure_writable(&self, op: &str) -> Result<()> {
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(Error::ReadOnly(format!(
                "cannot {}: admin store is read-only",
                op
            ))),
        }
    }

    /// Register a new file in state `UPLOAD_STARTED`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the filename is registered; use
    /// [`correct_checksum`](Self::correct_checksum) to replace a checksum.
    pub fn put_entry(
        &self,
        filename: &str,
        checksum: &str,
        reply: Option<PendingReply>,
    ) -> Result<()> {
        self.ensure_writable("put_entry")?;
        let entry = FileEntry::new(filename, checksum, reply, Timestamp::now())?;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if inner.state.has_entry(filename) {
            return Err(Error::AlreadyExists(format!(
                "admin entry for file '{}' already exists",
                filename
            )));
        }
        if let Some(journal) = self.journal(&mut inner.journal)? {
            journal.append(&entry)?;
        }
        inner.state.insert_entry(entry)?;
        debug!(target: "replica_admin::store", filename, checksum, "Registered file");
        Ok(())
    }

    /// Set the upload state of `filename` on `replica`. Last write wins.
    pub fn set_replica_state(
        &self,
        filename: &str,
        replica: ReplicaId,
        state: UploadState,
        at: Timestamp,
    ) -> Result<()> {
        self.ensure_writable("set_replica_state")?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if let Some(journal) = self.journal(&mut inner.journal)? {
            let mut updated = inner.state.get_entry(filename)?.clone();
            updated.set_replica_state(replica.clone(), state, at);
            journal.append(&updated)?;
        }
        inner.state.set_replica_state(filename, replica, state, at)?;
        Ok(())
    }

    /// Remove `filename` and all its replica records. Returns whether an
    /// entry existed.
    pub fn remove_entry(&self, filename: &str) -> Result<bool> {
        self.ensure_writable("remove_entry")?;
        check_token("filename", filename)?;
        let mut inner = self.inner.write();
        let removed = match inner.state.remove_entry(filename) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        match self.rewrite(&mut inner) {
            Ok(()) => {}
            Err(RewriteError::Aborted(e)) => {
                inner.state.insert_entry(removed)?;
                return Err(e);
            }
            Err(RewriteError::Applied(e)) => return Err(e),
        }
        info!(target: "replica_admin::store", filename, "Removed admin entry");
        Ok(true)
    }

    /// Replace the reference checksum of `filename`, keeping its replica
    /// records. Returns the previous checksum.
    pub fn correct_checksum(&self, filename: &str, checksum: &str) -> Result<String> {
        self.ensure_writable("correct_checksum")?;
        let mut inner = self.inner.write();
        let previous = inner.state.correct_checksum(filename, checksum)?;
        match self.rewrite(&mut inner) {
            Ok(()) => {}
            Err(RewriteError::Aborted(e)) => {
                inner.state.correct_checksum(filename, &previous)?;
                return Err(e);
            }
            Err(RewriteError::Applied(e)) => return Err(e),
        }
        info!(
            target: "replica_admin::store",
            filename,
            old = %previous,
            new = checksum,
            "Corrected checksum"
        );
        Ok(previous)
    }

    /// Attach a pending reply to `filename`. Never persisted.
    pub fn set_reply_info(&self, filename: &str, reply: PendingReply) -> Result<()> {
        self.ensure_writable("set_reply_info")?;
        self.inner.write().state.set_pending_reply(filename, reply)
    }

    /// Detach and return the pending reply of `filename`
    pub fn take_reply_info(&self, filename: &str) -> Result<Option<PendingReply>> {
        self.ensure_writable("take_reply_info")?;
        self.inner.write().state.take_pending_reply(filename)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Rewrite the admin file as a compact snapshot
    pub fn checkpoint(&self) -> Result<()> {
        self.ensure_writable("checkpoint")?;
        let mut inner = self.inner.write();
        self.rewrite(&mut inner).map_err(Error::from)
    }

    /// Snapshot the state and reopen the journal on the new file.
    ///
    /// The old journal is taken out first and only put back while the old
    /// file is still in place; after the rename it would append to an
    /// unlinked inode.
    fn rewrite(&self, inner: &mut Inner) -> std::result::Result<(), RewriteError> {
        let backing = match &self.backing {
            Some(backing) => backing,
            None => return Ok(()),
        };
        if let Some(journal) = inner.journal.as_mut() {
            journal
                .sync()
                .map_err(|e| RewriteError::Aborted(e.into()))?;
        }
        let previous = inner.journal.take();

        if let Err(e) = backing.snapshot.write_atomic(&inner.state) {
            if !e.snapshot_in_place() {
                inner.journal = previous;
                return Err(RewriteError::Aborted(e.into()));
            }
            warn!(
                target: "replica_admin::store",
                path = %backing.path.display(),
                error = %e,
                "Admin snapshot in place but not synced"
            );
            Self::reopen_journal(inner, backing)?;
            return Err(RewriteError::Applied(e.into()));
        }
        Self::reopen_journal(inner, backing)
    }

    fn reopen_journal(
        inner: &mut Inner,
        backing: &Backing,
    ) -> std::result::Result<(), RewriteError> {
        inner.loaded_stamp = file_stamp(&backing.path);
        match JournalWriter::open(&backing.path, backing.config.sync) {
            Ok(journal) => {
                inner.journal = Some(journal);
                Ok(())
            }
            Err(e) => {
                warn!(
                    target: "replica_admin::store",
                    path = %backing.path.display(),
                    error = %e,
                    "Failed to reopen admin journal after snapshot"
                );
                Err(RewriteError::Applied(e.into()))
            }
        }
    }

    /// Reload from disk if the admin file changed (modification time or
    /// length) since the last load.
    ///
    /// Only a read-only store reloads; a read-write store owns the file and
    /// answers `false`. Returns whether the state was rebuilt.
    pub fn refresh(&self) -> Result<bool> {
        let backing = match (&self.backing, self.mode) {
            (Some(backing), AccessMode::ReadOnly) => backing,
            _ => return Ok(false),
        };
        let current = file_stamp(&backing.path);
        if current == self.inner.read().loaded_stamp {
            return Ok(false);
        }

        let mut state = AdminState::new();
        let stats = if backing.path.exists() {
            Some(backing.reader.read_path(&backing.path, &mut state, Timestamp::now())?)
        } else {
            None
        };
        let mut inner = self.inner.write();
        inner.state = state;
        inner.last_load = stats;
        inner.loaded_stamp = current;
        debug!(
            target: "replica_admin::store",
            path = %backing.path.display(),
            entries = inner.state.len(),
            "Refreshed read-only admin data"
        );
        Ok(true)
    }

    /// Flush the journal and release the store
    pub fn close(self) -> Result<()> {
        if let Some(journal) = self.inner.write().journal.as_mut() {
            journal.sync()?;
        }
        Ok(())
    }
}

impl Drop for AdminStore {
    fn drop(&mut self) {
        if let Some(journal) = self.inner.get_mut().journal.as_mut() {
            if let Err(e) = journal.sync() {
                warn!(target: "replica_admin::store", error = %e, "Failed to flush admin journal on close");
            }
        }
    }
}

fn file_stamp(path: &Path) -> Option<FileStamp> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

pub(crate) fn lock_error(dir: &Path) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::WouldBlock,
        format!(
            "admin directory '{}' is already in use by another process",
            dir.display()
        ),
    ))
}
