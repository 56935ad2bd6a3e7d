//! Persisted packing progress.
//!
//! Each work unit has one `session_state.json` holding a [`StateSnapshot`],
//! rewritten in full after every mutation. Writes go to a sibling temp file
//! that is fsynced and renamed over the canonical file, so a crash at any
//! point leaves either the previous snapshot or the new one on disk.
//!
//! A snapshot that fails to parse is reported as
//! [`PackError::CorruptState`](crate::error::PackError::CorruptState) and never
//! silently replaced. Operators recover with [`SnapshotStore::quarantine`].

mod model;
mod store;


pub use model::{
    Aggregate, CompletedOrder, InProgressOrder, SCHEMA_VERSION, SnapshotItem, StateSnapshot,
};
pub use store::{LoadedState, SnapshotStore};
