//! Filesystem utilities for packguard.
//!
//! This module provides the write-temp-then-replace primitives that both
//! persisted artifacts (lock files and state snapshots) are written through.

pub mod atomic;

pub use atomic::{StagedWrite, atomic_create, atomic_write, atomic_write_file, stage_write};
