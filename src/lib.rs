//! Packguard: work unit locking and crash-safe packing progress for stations
//! sharing a network volume.
//!
//! A work unit is one packing list, a directory under a shared root. A
//! station claims it through a heartbeated lock file ([`locks`]), packs its
//! orders through the [`session`] state machine, and every accepted scan is
//! persisted as a [`snapshot`] so a crash or handover resumes exactly where
//! packing stopped.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod session;
pub mod snapshot;
