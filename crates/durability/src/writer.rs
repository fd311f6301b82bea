//! Crash-safe snapshot writer
//!
//! A snapshot is a complete `0.4` admin file: the version line, then one
//! line per entry sorted by filename.
//!
//! # Crash Safety
//!
//! 1. Write to a temporary file next to the target (`.<name>.tmp`)
//! 2. fsync the temporary file
//! 3. Atomic rename over the target
//! 4. fsync the parent directory
//!
//! Readers see either the old file or the complete new one.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use replica_admin_storage::AdminState;

use crate::error::{DurabilityError, DurabilityResult};
use crate::format::{format_entry, CURRENT_VERSION};

/// Writes full snapshots of an `AdminState`
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    /// Writer targeting the admin file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotWriter { path: path.into() }
    }

    /// Target admin file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary file used while writing
    pub fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    /// Render `state` into `out`. Returns the number of entries written.
    pub fn write_to<W: Write>(state: &AdminState, out: &mut W) -> io::Result<usize> {
        let mut entries: Vec<_> = state.entries().collect();
        entries.sort_by(|a, b| a.filename().cmp(b.filename()));

        writeln!(out, "{}", CURRENT_VERSION)?;
        for entry in &entries {
            writeln!(out, "{}", format_entry(entry))?;
        }
        Ok(entries.len())
    }

    /// Replace the admin file with a snapshot of `state`
    pub fn write_atomic(&self, state: &AdminState) -> DurabilityResult<usize> {
        let temp_path = self.temp_path();
        let temp_err = |e: io::Error| DurabilityError::io(&temp_path, e);

        // Step 1: write to the temporary file
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(temp_err)?;
        let mut out = BufWriter::new(file);
        let count = Self::write_to(state, &mut out).map_err(temp_err)?;
        let file = out
            .into_inner()
            .map_err(|e| DurabilityError::io(&temp_path, e.into_error()))?;

        // Step 2: fsync
        file.sync_all().map_err(temp_err)?;
        drop(file);

        // Step 3: atomic rename
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(DurabilityError::io(&self.path, e));
        }

        // Step 4: fsync the parent directory
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            sync_dir(dir).map_err(|source| DurabilityError::Unsynced {
                path: self.path.clone(),
                source,
            })?;
        }

        debug!(
            target: "replica_admin::snapshot",
            path = %self.path.display(),
            entries = count,
            "Wrote admin snapshot"
        );
        Ok(count)
    }

    /// Remove a temporary file left behind by an interrupted write
    pub fn cleanup_temp_file(&self) -> io::Result<bool> {
        match std::fs::remove_file(self.temp_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
