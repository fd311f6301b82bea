//! Durability layer for replica admin data
//!
//! This crate handles everything that touches the admin file:
//!
//! - Textual admin format: versions `0.4` (written) and `0.3` (read only)
//! - Loading with per-line recovery and load diagnostics
//! - Crash-safe snapshot rewrites
//! - Append journal for per-mutation persistence
//! - `admin.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod format;
pub mod journal;
pub mod observer;
pub mod reader;
pub mod testing;
pub mod writer;

pub use config::{AdminConfig, ConfigError, SyncMode, CONFIG_FILE_NAME, LOCK_FILE_NAME};
pub use error::{DurabilityError, DurabilityResult};
pub use format::{
    format_entry, FormatVersion, LineDefect, LineRecord, ReplicaSegment, SegmentDefect,
    ADMIN_FILE_NAME, CURRENT_VERSION, LEGACY_VERSION,
};
pub use journal::JournalWriter;
pub use observer::{DropReason, LoadEvent, LoadObserver, TracingObserver};
pub use reader::{AdminReader, LoadStats};
pub use writer::SnapshotWriter;
