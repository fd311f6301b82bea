//! Store builder for fluent configuration
//!
//! ```ignore
//! use replica_admin_engine::AdminStore;
//!
//! // 1. Read-write with the directory's admin.toml
//! let store = AdminStore::open("/data/admin")?;
//!
//! // 2. Builder for an explicit mode, config or observer
//! let store = AdminStore::builder()
//!     .path("/data/admin")
//!     .read_only()
//!     .observer(Arc::new(my_observer))
//!     .open()?;
//!
//! // 3. Ephemeral (no files, testing)
//! let store = AdminStore::ephemeral();
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use replica_admin_core::{Error, Result};
use replica_admin_durability::{
    AdminConfig, AdminReader, DurabilityError, LoadObserver, TracingObserver, CONFIG_FILE_NAME,
    LOCK_FILE_NAME,
};

use super::{lock_error, AccessMode, AdminStore};

/// Builder for [`AdminStore`]
pub struct AdminStoreBuilder {
    /// Admin directory (required for open())
    path: Option<PathBuf>,
    mode: AccessMode,
    /// Explicit config; when absent, `admin.toml` is read
    config: Option<AdminConfig>,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl Default for AdminStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminStoreBuilder {
    /// Create a builder for a read-write store
    pub fn new() -> Self {
        AdminStoreBuilder {
            path: None,
            mode: AccessMode::ReadWrite,
            config: None,
            observer: None,
        }
    }

    /// Set the admin directory
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Open without writing or locking
    pub fn read_only(mut self) -> Self {
        self.mode = AccessMode::ReadOnly;
        self
    }

    /// Open as the single writer (default)
    pub fn read_write(mut self) -> Self {
        self.mode = AccessMode::ReadWrite;
        self
    }

    /// Set the access mode
    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use `config` instead of `admin.toml`.
    ///
    /// A read-write store writes it to `admin.toml` so later opens pick up
    /// the same settings.
    pub fn config(mut self, config: AdminConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Receive load diagnostics; defaults to [`TracingObserver`]
    pub fn observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Open the store.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if no path was set or the config is invalid
    /// - `Io` (`WouldBlock`) if another process holds the directory lock
    /// - `Format` if the admin file has an unsupported version
    /// - `Io` on any other file failure
    pub fn open(self) -> Result<AdminStore> {
        let dir = self.path.ok_or_else(|| {
            Error::invalid_argument(
                "AdminStoreBuilder::open() requires a path. Use AdminStore::ephemeral() for testing.",
            )
        })?;
        let config_path = dir.join(CONFIG_FILE_NAME);

        let config = match (self.mode, self.config) {
            (AccessMode::ReadWrite, Some(config)) => {
                std::fs::create_dir_all(&dir)?;
                config.validate().map_err(DurabilityError::from)?;
                config.write_to_file(&config_path).map_err(DurabilityError::from)?;
                config
            }
            (AccessMode::ReadWrite, None) => {
                std::fs::create_dir_all(&dir)?;
                AdminConfig::write_default_if_missing(&config_path).map_err(DurabilityError::from)?;
                AdminConfig::from_file(&config_path).map_err(DurabilityError::from)?
            }
            (AccessMode::ReadOnly, Some(config)) => {
                config.validate().map_err(DurabilityError::from)?;
                config
            }
            (AccessMode::ReadOnly, None) if config_path.exists() => {
                AdminConfig::from_file(&config_path).map_err(DurabilityError::from)?
            }
            (AccessMode::ReadOnly, None) => AdminConfig::default(),
        };

        let lock_file = match self.mode {
            AccessMode::ReadWrite => {
                let lock_file = OpenOptions::new()
                    .create(true)
                    .truncate(false)
                    .read(true)
                    .write(true)
                    .open(dir.join(LOCK_FILE_NAME))?;
                fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| lock_error(&dir))?;
                Some(lock_file)
            }
            AccessMode::ReadOnly => None,
        };

        let observer = self.observer.unwrap_or_else(|| Arc::new(TracingObserver));
        let path = config.admin_file(&dir);
        info!(
            target: "replica_admin::store",
            path = %path.display(),
            mode = ?self.mode,
            sync = ?config.sync,
            "Opening admin store"
        );
        AdminStore::load(path, self.mode, config, AdminReader::new(observer), lock_file)
    }
}
