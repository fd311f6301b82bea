//! Fatal durability errors
//!
//! Only file-level failures live here: I/O on the admin file and an
//! unreadable version header. Defects inside individual lines are recovered
//! by the reader and reported through the `LoadObserver`.

use std::io;
use std::path::PathBuf;

use replica_admin_core::Error;

use crate::config::ConfigError;

/// Result alias for durability operations
pub type DurabilityResult<T> = std::result::Result<T, DurabilityError>;

/// Errors that abort a load or a save
#[derive(Debug, thiserror::Error)]
pub enum DurabilityError {
    /// I/O failure on a named file
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A snapshot was renamed over the admin file, but its directory could
    /// not be synced. The new content is in place; the rename may not
    /// survive a crash.
    #[error("Snapshot written to '{path}' but syncing its directory failed: {source}")]
    Unsynced {
        /// Admin file that was replaced
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// I/O failure on an unnamed stream
    #[error("I/O error reading admin data: {0}")]
    Stream(#[source] io::Error),

    /// First line is neither a supported version nor absent
    #[error("Unsupported admin data version '{0}'")]
    UnsupportedVersion(String),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DurabilityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DurabilityError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failed write had already replaced the target file
    pub fn snapshot_in_place(&self) -> bool {
        matches!(self, DurabilityError::Unsynced { .. })
    }
}

impl From<DurabilityError> for Error {
    fn from(e: DurabilityError) -> Self {
        match e {
            DurabilityError::Io { path, source } => Error::Io(io::Error::new(
                source.kind(),
                format!("'{}': {}", path.display(), source),
            )),
            DurabilityError::Unsynced { path, source } => Error::Io(io::Error::new(
                source.kind(),
                format!("'{}' replaced but directory sync failed: {}", path.display(), source),
            )),
            DurabilityError::Stream(source) => Error::Io(source),
            DurabilityError::UnsupportedVersion(v) => {
                Error::format(format!("unsupported admin data version '{}'", v))
            }
            DurabilityError::Config(c) => Error::invalid_argument(c.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_maps_to_format() {
        let err: Error = DurabilityError::UnsupportedVersion("0.9".to_string()).into();
        assert!(matches!(err, Error::Format(ref m) if m.contains("0.9")));
    }

    #[test]
    fn test_io_error_keeps_path_and_kind() {
        let e = DurabilityError::io(
            "/tmp/admin.data",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().contains("/tmp/admin.data"));
        match Error::from(e) {
            Error::Io(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied);
                assert!(inner.to_string().contains("admin.data"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
