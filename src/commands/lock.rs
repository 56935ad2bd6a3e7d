//! `packguard lock` subcommands.

use super::open_root;
use crate::cli::{ForceArgs, LockAction, UnitArgs};
use packguard::clock::{Clock, SystemClock};
use packguard::context::WorkUnitId;
use packguard::error::{PackError, Result};
use packguard::locks::{
    HolderIdentity, LockRecord, LockStatus, LockStore, UnitLockState, format_age,
};
use std::path::Path;

pub(super) fn dispatch(root: Option<&Path>, action: LockAction) -> Result<()> {
    let (ctx, config) = open_root(root)?;
    let store = LockStore::new(ctx, config.staleness_policy());

    match action {
        LockAction::List => cmd_lock_list(&store),
        LockAction::Status(args) => cmd_lock_status(&store, args),
        LockAction::Release(args) => {
            cmd_lock_release(&store, args, &HolderIdentity::current(&config))
        }
        LockAction::ForceRelease(args) => cmd_lock_force_release(&store, args),
    }
}

fn cmd_lock_list(store: &LockStore) -> Result<()> {
    let locks = store.list_all()?;

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Work unit locks ({}):", locks.len());
    println!();

    for lock in &locks {
        println!("  {}:", lock.unit);
        print_record(&lock.record, "    ");
        println!("    Heartbeat:  {} ago", format_age(lock.age));
        if lock.status == LockStatus::Stale {
            println!(
                "    Status:     STALE (no heartbeat for more than {})",
                format_age(stale_timeout(store))
            );
        }
        println!("    Path:       {}", lock.path.display());
        println!();
    }

    let stale_count = locks
        .iter()
        .filter(|l| l.status == LockStatus::Stale)
        .count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `packguard lock force-release <unit> --force` to clear.",
            stale_count
        );
    }

    Ok(())
}

fn cmd_lock_status(store: &LockStore, args: UnitArgs) -> Result<()> {
    let unit = WorkUnitId::new(args.unit)?;

    match store.status(&unit)? {
        UnitLockState::Free => println!("Work unit '{}' is not locked.", unit),
        UnitLockState::Held { record, status } => {
            println!("Work unit '{}' is locked ({}):", unit, status);
            print_record(&record, "  ");
            println!(
                "  Heartbeat:  {} ago",
                format_age(record.heartbeat_age(SystemClock.now()))
            );
            println!("  Path:       {}", store.lock_path(&unit).display());
        }
    }

    Ok(())
}

fn cmd_lock_release(store: &LockStore, args: UnitArgs, me: &HolderIdentity) -> Result<()> {
    let unit = WorkUnitId::new(args.unit)?;

    match store.status(&unit)? {
        UnitLockState::Free => {
            println!("Work unit '{}' is not locked.", unit);
            Ok(())
        }
        UnitLockState::Held { record, .. } if held_by_station(&record, me) => {
            store.release(&unit)?;
            println!("Released lock on '{}'.", unit);
            Ok(())
        }
        UnitLockState::Held { record, .. } => Err(PackError::UserError(format!(
            "work unit '{}' is locked by {}, not by this station.\n\n\
             To take the lock over, confirm that station has stopped, then run:\n  \
             packguard lock force-release {} --force",
            unit, record, unit
        ))),
    }
}

fn cmd_lock_force_release(store: &LockStore, args: ForceArgs) -> Result<()> {
    if !args.force {
        return Err(PackError::UserError(format!(
            "refusing to force-release lock without --force flag.\n\n\
             Releasing a lock while its station is still packing lets two stations\n\
             write the same work unit. Only do this if the holder has crashed or left.\n\n\
             To release the lock, run:\n  packguard lock force-release {} --force",
            args.unit
        )));
    }

    let unit = WorkUnitId::new(args.unit)?;

    match store.force_release(&unit)? {
        Some(record) => {
            println!("Released lock on '{}'.", unit);
            println!();
            println!("Lock details:");
            print_record(&record, "  ");
            println!(
                "  Heartbeat:  {} ago",
                format_age(record.heartbeat_age(SystemClock.now()))
            );
        }
        None => println!("Work unit '{}' was not locked (or its lock file was unreadable).", unit),
    }

    Ok(())
}

/// Same host and user, any process: a previous session on this station.
fn held_by_station(record: &LockRecord, me: &HolderIdentity) -> bool {
    record.holder_host == me.host && record.holder_user == me.user
}

fn stale_timeout(store: &LockStore) -> chrono::Duration {
    chrono::Duration::from_std(store.policy().stale_timeout).unwrap_or(chrono::Duration::zero())
}

fn print_record(record: &LockRecord, indent: &str) {
    println!("{}Holder:     {}", indent, record.owner());
    println!("{}PID:        {}", indent, record.holder_process_id);
    match (&record.worker_name, &record.worker_id) {
        (Some(name), Some(id)) => println!("{}Worker:     {} [{}]", indent, name, id),
        (Some(name), None) => println!("{}Worker:     {}", indent, name),
        (None, Some(id)) => println!("{}Worker:     [{}]", indent, id),
        (None, None) => {}
    }
    println!(
        "{}Acquired:   {}",
        indent,
        record.acquired_at.format("%Y-%m-%d %H:%M:%S %:z")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn release_matches_same_station_any_pid() {
        let now = DateTime::parse_from_rfc3339("2026-03-02T08:00:00+01:00").unwrap();
        let record = LockRecord::new(&HolderIdentity::new("station-1", "ana", 101), now);

        assert!(held_by_station(
            &record,
            &HolderIdentity::new("station-1", "ana", 999)
        ));
        assert!(!held_by_station(
            &record,
            &HolderIdentity::new("station-2", "ana", 101)
        ));
        assert!(!held_by_station(
            &record,
            &HolderIdentity::new("station-1", "ben", 101)
        ));
    }
}
