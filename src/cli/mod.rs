//! CLI argument parsing for packguard.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Packguard: work unit locking and crash-safe packing progress.
///
/// Work units are directories under a shared root:
/// - `session.lock` claims a unit for one station and is kept alive by heartbeats
/// - `session_state.json` records every accepted scan
/// - `session_summary.json` is written once when a unit is finished
#[derive(Parser, Debug)]
#[command(name = "packguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Shared root directory holding the work units.
    #[arg(long, global = true, env = "PACKGUARD_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for packguard.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock management commands.
    ///
    /// List, inspect, or release work unit locks.
    Lock(LockCommand),

    /// Persisted state commands.
    ///
    /// Show or quarantine a work unit's snapshot.
    State(StateCommand),

    /// Pack a work unit interactively.
    ///
    /// Acquires the unit's lock, resumes its progress, and reads scans from
    /// stdin: `order <id>` starts or resumes an order, `finish` writes the
    /// session summary, `quit` stops without one, anything else is an item.
    Pack(PackArgs),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all work unit locks under the root.
    List,

    /// Show the lock state of one work unit.
    Status(UnitArgs),

    /// Release a lock held by this station.
    Release(UnitArgs),

    /// Remove a lock regardless of who holds it.
    ///
    /// Requires --force flag to prevent accidental takeover.
    ForceRelease(ForceArgs),
}

/// State subcommands.
#[derive(Parser, Debug)]
pub struct StateCommand {
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Show a work unit's saved progress.
    Show(UnitArgs),

    /// Move an unreadable snapshot aside so the unit can start over.
    ///
    /// Requires --force flag.
    Quarantine(ForceArgs),
}

/// Arguments naming a single work unit.
#[derive(Parser, Debug)]
pub struct UnitArgs {
    /// Work unit id (the directory name under the root).
    pub unit: String,
}

/// Arguments for destructive unit operations.
#[derive(Parser, Debug)]
pub struct ForceArgs {
    /// Work unit id.
    pub unit: String,

    /// Confirm the operation.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `pack` command.
#[derive(Parser, Debug)]
pub struct PackArgs {
    /// Work unit id to pack.
    pub unit: String,

    /// Manifest file (defaults to `{root}/{unit}/manifest.json`).
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
