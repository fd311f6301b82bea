//! Admin store configuration via `admin.toml`
//!
//! The config file sits next to the admin data in the admin directory. On
//! first read-write open a commented default is written; to change
//! settings, edit the file and reopen the store.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::format::ADMIN_FILE_NAME;

/// Config file name placed in the admin directory
pub const CONFIG_FILE_NAME: &str = "admin.toml";

/// Lock file taken by a read-write store inside the admin directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// When journal appends reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// fsync after every mutation
    #[default]
    Always,
    /// Leave appends in the OS buffer; flushed on checkpoint and close
    Buffered,
}

impl SyncMode {
    /// Whether every append is followed by an fsync
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, SyncMode::Always)
    }
}

/// Errors reading, writing or validating `admin.toml`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for `AdminConfig`
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Config could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config file could not be written
    #[error("Failed to write config file '{path}': {source}")]
    Write {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// `file_name` is empty or names something outside the admin directory
    #[error("Invalid admin file name '{0}': expected a plain file name")]
    InvalidFileName(String),

    /// `file_name` collides with a file the store manages itself
    #[error("Invalid admin file name '{0}': reserved for the store's own files")]
    ReservedFileName(String),
}

/// Admin store configuration loaded from `admin.toml`.
///
/// # Example
///
/// ```toml
/// file_name = "admin.data"
/// sync = "always"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Name of the admin data file inside the admin directory
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Journal sync mode
    #[serde(default)]
    pub sync: SyncMode,
}

fn default_file_name() -> String {
    ADMIN_FILE_NAME.to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            file_name: default_file_name(),
            sync: SyncMode::default(),
        }
    }
}

impl AdminConfig {
    /// Set the admin data file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Set the journal sync mode
    pub fn with_sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    /// Path of the admin data file inside `dir`
    pub fn admin_file(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    /// Reject file names that are empty, contain whitespace, or leave the
    /// admin directory.
    ///
    /// The config file, the lock file and snapshot temp files (`.<name>.tmp`)
    /// are reserved: a snapshot rename onto any of them would replace a file
    /// the store depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.file_name.as_str();
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\');
        if bad {
            return Err(ConfigError::InvalidFileName(name.to_string()));
        }
        let reserved = name == CONFIG_FILE_NAME
            || name == LOCK_FILE_NAME
            || (name.starts_with('.') && name.ends_with(".tmp"));
        if reserved {
            return Err(ConfigError::ReservedFileName(name.to_string()));
        }
        Ok(())
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Replica admin configuration
#
# Admin data file, relative to this directory (default: "admin.data")
file_name = "admin.data"

# Journal sync mode: "always" (default) or "buffered"
#   "always"   = fsync after every mutation
#   "buffered" = fsync on checkpoint and close only
sync = "always"
"#
    }

    /// Read, parse and validate config from a file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AdminConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
