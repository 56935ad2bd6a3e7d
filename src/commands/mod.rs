//! Command implementations for packguard.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Commands are thin: they resolve the root and config,
//! call into the library, and print what happened.

mod lock;
mod pack;
mod state;

use crate::cli::{Cli, Command};
use packguard::config::Config;
use packguard::context::RootContext;
use packguard::error::Result;
use std::path::Path;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let Cli { root, command } = cli;
    match command {
        Command::Lock(lock_cmd) => lock::dispatch(root.as_deref(), lock_cmd.action),
        Command::State(state_cmd) => state::dispatch(root.as_deref(), state_cmd.action),
        Command::Pack(args) => pack::cmd_pack(root.as_deref(), args),
    }
}

/// Resolve the shared root and the effective config for this station.
fn open_root(root: Option<&Path>) -> Result<(RootContext, Config)> {
    let ctx = RootContext::resolve(root)?;
    let config = Config::resolve(ctx.config_path())?;
    tracing::debug!(
        root = %ctx.root.display(),
        heartbeat_secs = config.heartbeat_interval_secs,
        stale_secs = config.stale_timeout_secs,
        "root resolved"
    );
    Ok((ctx, config))
}
