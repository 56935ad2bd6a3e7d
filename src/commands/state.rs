//! `packguard state` subcommands.

use super::open_root;
use crate::cli::{ForceArgs, StateAction, UnitArgs};
use chrono::Duration;
use packguard::clock::{Clock, SystemClock};
use packguard::context::{RootContext, WorkUnitId};
use packguard::error::{PackError, Result};
use packguard::locks::{LockStatus, LockStore, UnitLockState, format_age};
use packguard::snapshot::{LoadedState, SnapshotItem, SnapshotStore, StateSnapshot};
use std::path::Path;

pub(super) fn dispatch(root: Option<&Path>, action: StateAction) -> Result<()> {
    let (ctx, config) = open_root(root)?;
    let locks = LockStore::new(ctx.clone(), config.staleness_policy());

    match action {
        StateAction::Show(args) => cmd_state_show(&ctx, args),
        StateAction::Quarantine(args) => cmd_state_quarantine(&ctx, &locks, args),
    }
}

fn cmd_state_show(ctx: &RootContext, args: UnitArgs) -> Result<()> {
    let unit = WorkUnitId::new(args.unit)?;
    let store = SnapshotStore::new(ctx.clone());

    let snapshot = match store.load(&unit) {
        Ok(LoadedState::Empty) => {
            println!("No saved progress for work unit '{}'.", unit);
            return Ok(());
        }
        Ok(LoadedState::Snapshot(snapshot)) => snapshot,
        Err(err @ PackError::CorruptState { .. }) => {
            eprintln!(
                "Hint: inspect the file, then run `packguard state quarantine {} --force` to start the unit over.",
                unit
            );
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    print_snapshot(&snapshot);

    if let Some(summary) = store.load_summary(&unit)? {
        println!();
        print!("{}", summary);
    }

    Ok(())
}

fn cmd_state_quarantine(ctx: &RootContext, locks: &LockStore, args: ForceArgs) -> Result<()> {
    if !args.force {
        return Err(PackError::UserError(format!(
            "refusing to quarantine state without --force flag.\n\n\
             The unit will start over from an empty state; the old file is kept\n\
             next to it for inspection.\n\n\
             To quarantine, run:\n  packguard state quarantine {} --force",
            args.unit
        )));
    }

    let unit = WorkUnitId::new(args.unit)?;
    let store = SnapshotStore::new(ctx.clone());

    if let UnitLockState::Held {
        record,
        status: LockStatus::Active,
    } = locks.status(&unit)?
    {
        return Err(PackError::LockConflict {
            unit: unit.to_string(),
            holder: Box::new(record),
        });
    }

    match store.load(&unit) {
        Ok(LoadedState::Snapshot(_)) => {
            return Err(PackError::UserError(format!(
                "state for work unit '{}' is readable; refusing to quarantine it",
                unit
            )));
        }
        Ok(LoadedState::Empty) | Err(PackError::CorruptState { .. }) => {}
        Err(err) => return Err(err),
    }

    match store.quarantine(&unit, SystemClock.now())? {
        Some(moved) => println!("Moved state for '{}' to {}", unit, moved.display()),
        None => println!("Work unit '{}' has no state file.", unit),
    }

    Ok(())
}

fn print_snapshot(snapshot: &StateSnapshot) {
    let agg = &snapshot.aggregate;
    println!("Work unit: {}", snapshot.work_unit_id);
    println!(
        "  Saved:     {}",
        snapshot.saved_at.format("%Y-%m-%d %H:%M:%S %:z")
    );
    println!(
        "  Orders:    {}/{} completed",
        agg.completed_orders, agg.total_orders
    );
    println!("  Items:     {}/{} packed", agg.packed_items, agg.total_items);
    println!(
        "  Active:    {}",
        agg.active_order_id.as_deref().unwrap_or("(none)")
    );

    if !snapshot.in_progress.is_empty() {
        println!();
        println!("In progress:");
        for (order_id, order) in &snapshot.in_progress {
            println!(
                "  {} (started {})",
                order_id,
                order.started_at.format("%H:%M:%S")
            );
            print_items(&order.items);
        }
    }

    if !snapshot.completed.is_empty() {
        println!();
        println!("Completed:");
        for order in &snapshot.completed {
            println!(
                "  {} ({})",
                order.order_id,
                format_age(Duration::seconds(order.duration_secs))
            );
        }
    }
}

fn print_items(items: &[SnapshotItem]) {
    for item in items {
        println!(
            "    {:<20} {}/{}{}",
            item.identifier,
            item.packed,
            item.required,
            if item.packed == item.required {
                ""
            } else {
                " *"
            }
        );
    }
}
