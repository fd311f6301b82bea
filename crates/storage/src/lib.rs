//! In-memory registry for replica admin data
//!
//! This crate implements the data side of the admin store:
//! - AdminState: filename → FileEntry map with a secondary state index
//! - StateIndex: (replica, upload state) → filenames
//! - ConsistencyView: read-only projections and reports for tooling
//!
//! Nothing here locks or touches disk; see the engine crate for the shared,
//! persistent store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admin_state;
pub mod index;
pub mod view;

pub use admin_state::AdminState;
pub use index::StateIndex;
pub use view::{ConsistencyReport, ConsistencyView, ReplicaSummary};
