//! Packing sessions.
//!
//! A [`WorkSession`] walks each order of a [`Manifest`] through
//! `Unstarted -> InProgress -> Completed`, one scan at a time, saving a
//! snapshot after every accepted scan. [`PackSession`] wraps it with the
//! work unit's lock and heartbeat.

mod machine;
mod manifest;
mod order;
mod pack;
mod summary;

#[cfg(test)]
mod tests;

pub use machine::{ResumeKind, ScanOutcome, StartOutcome, WorkSession};
pub use manifest::{Manifest, ManifestItem, ManifestOrder, WorkManifest, normalize_identifier};
pub use order::{ItemState, OrderState, OrderStatus};
pub use pack::PackSession;
pub use summary::{OrderDurations, OrderTiming, SessionSummary};
