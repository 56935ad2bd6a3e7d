//! Configuration model for packguard.
//!
//! This module defines the Config struct that represents `{root}/packguard.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, environment overrides for per-station
//! settings, and validation of config values.

mod model;
mod operations;


pub use model::Config;
pub use operations::{
    ENV_HEARTBEAT_SECS, ENV_STALE_SECS, ENV_WORKER_ID, ENV_WORKER_NAME,
};
