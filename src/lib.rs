//! replica-admin - Per-replica upload state tracking for bit-preservation archives
//!
//! Every archived file is registered once with its reference checksum. Each
//! replica then reports how far its copy has come (`UPLOAD_STARTED` through
//! `UPLOAD_COMPLETED` or `UPLOAD_FAILED`), and tooling asks which files are
//! in which state where.
//!
//! # Quick Start
//!
//! ```ignore
//! use replica_admin::{AdminStore, ReplicaId, Timestamp, UploadState};
//!
//! let store = AdminStore::open("/data/admin")?;
//! store.put_entry("f1.arc", "a1b2c3", None)?;
//! store.set_replica_state(
//!     "f1.arc",
//!     ReplicaId::new("BA1")?,
//!     UploadState::UploadCompleted,
//!     Timestamp::now(),
//! )?;
//!
//! let done = store.filenames_with_state("BA1", UploadState::UploadCompleted);
//! ```
//!
//! # Architecture
//!
//! The [`AdminStore`] is the entry point. The registry, the admin file
//! format and the core types are re-exported for tooling that works on
//! them directly.

pub use replica_admin_core::*;
pub use replica_admin_durability::{
    AdminConfig, AdminReader, FormatVersion, LoadEvent, LoadObserver, LoadStats, SyncMode,
    TracingObserver, ADMIN_FILE_NAME, CONFIG_FILE_NAME,
};
pub use replica_admin_engine::{AccessMode, AdminStore, AdminStoreBuilder};
pub use replica_admin_storage::{AdminState, ConsistencyReport, ConsistencyView, ReplicaSummary};
