//! Admin store engine
//!
//! This crate ties the lower layers together:
//! - AdminStore: locked registry with read-write / read-only modes
//! - Open lifecycle: config, directory lock, load, legacy upgrade
//! - Persistence of mutations through the journal and snapshots
//!
//! The engine is the only component that knows about both the in-memory
//! registry and the admin file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

pub use store::{AccessMode, AdminStore, AdminStoreBuilder};
