//! Error types for replica admin data
//!
//! Runtime failures surfaced to callers of the store. Line- and
//! segment-level defects found while loading a snapshot are not errors;
//! they are reported to the load observer and recovered locally.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for admin data operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the admin data store
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input (empty identifiers, negative ids, unknown ordinals)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown filename, or unknown (filename, replica) pair
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed textual data (state names, timestamps, version headers)
    #[error("Format error: {0}")]
    Format(String),

    /// Filename already registered; use the correction path to overwrite
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Mutation attempted on a read-only store
    #[error("Read-only store: {0}")]
    ReadOnly(String),

    /// I/O error (admin file, lock file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Build a `NotFound` error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Build a `Format` error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
