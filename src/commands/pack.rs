//! `packguard pack`: the interactive scan loop.

use super::open_root;
use crate::cli::PackArgs;
use packguard::clock::{Clock, SystemClock};
use packguard::context::WorkUnitId;
use packguard::error::{PackError, Result};
use packguard::locks::format_age;
use packguard::session::{Manifest, PackSession, ResumeKind, ScanOutcome, StartOutcome};
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// One line of operator input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Order(&'a str),
    Item(&'a str),
    Finish,
    Quit,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    if line.eq_ignore_ascii_case("finish") {
        return Input::Finish;
    }
    if line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    if let Some((word, rest)) = line.split_once(char::is_whitespace)
        && word.eq_ignore_ascii_case("order")
    {
        return Input::Order(rest.trim());
    }
    Input::Item(line)
}

pub(super) fn cmd_pack(root: Option<&Path>, args: PackArgs) -> Result<()> {
    let (ctx, config) = open_root(root)?;
    let unit = WorkUnitId::new(args.unit)?;
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| ctx.manifest_path(&unit));
    let manifest = Manifest::load(&manifest_path)?;

    let session = match PackSession::open(&ctx, &config, unit, manifest) {
        Ok(session) => session,
        Err(err) => {
            if let PackError::LockConflict { holder, .. }
            | PackError::StaleLockDetected { holder, .. } = &err
            {
                eprintln!(
                    "Last heartbeat from {} was {} ago.",
                    holder.owner(),
                    format_age(holder.heartbeat_age(SystemClock.now()))
                );
            }
            return Err(err);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_scan_loop(session, stdin.lock(), &mut stdout.lock())
}

/// Drive a session from operator input until `finish`, `quit`, or end of input.
///
/// Scan rejections are printed and the loop continues; any other error ends
/// the session, releasing its lock. Once the heartbeat has seen another
/// station take the lock over, no further line is applied.
fn run_scan_loop<C, R, W>(mut session: PackSession<C>, input: R, out: &mut W) -> Result<()>
where
    C: Clock,
    R: BufRead,
    W: Write,
{
    print_opening(&session, out)?;

    for line in input.lines() {
        let line = line.map_err(|e| PackError::Io(format!("failed to read input: {}", e)))?;

        let input = parse_input(&line);
        if matches!(input, Input::Order(_) | Input::Item(_) | Input::Finish)
            && session.lock().lost_ownership()
        {
            return Err(PackError::UserError(format!(
                "the lock on work unit '{}' was taken over by another station; \
                 progress up to the last accepted scan is saved",
                session.work().unit()
            )));
        }

        let result = match input {
            Input::Blank => continue,
            Input::Quit => break,
            Input::Finish => {
                let summary = session.finish()?;
                say(out, summary)?;
                return Ok(());
            }
            Input::Order(order_id) => session
                .work_mut()
                .start_order(order_id)
                .map(|outcome| describe_start(&session, order_id, outcome)),
            Input::Item(identifier) => session
                .work_mut()
                .scan_item(identifier)
                .map(|outcome| describe_scan(&session, outcome)),
        };

        match result {
            Ok(message) => say(out, message)?,
            Err(err) if err.is_scan_rejection() => say(out, format!("Rejected: {}", err))?,
            Err(err) => return Err(err),
        }
    }

    say(out, "Session closed; progress saved.")?;
    session.close()
}

fn print_opening<C: Clock, W: Write>(session: &PackSession<C>, out: &mut W) -> Result<()> {
    let work = session.work();
    let progress = work.progress();
    let verb = match work.resume_kind() {
        ResumeKind::Fresh => "Started",
        ResumeKind::Resumed => "Resumed",
    };
    say(
        out,
        format!(
            "{} work unit '{}': {}/{} orders, {}/{} items packed.",
            verb,
            work.unit(),
            progress.completed_orders,
            progress.total_orders,
            progress.packed_items,
            progress.total_items
        ),
    )?;
    if let Some(active) = work.active_order() {
        say(out, format!("Active order: {}", active.order_id))?;
    }
    Ok(())
}

fn describe_start<C: Clock>(
    session: &PackSession<C>,
    order_id: &str,
    outcome: StartOutcome,
) -> String {
    let Some(order) = session.work().active_order() else {
        return format!("Order {} active.", order_id);
    };
    match outcome {
        StartOutcome::Started => format!(
            "Order {} started: {} item(s) to pack.",
            order.order_id,
            order.required_items()
        ),
        StartOutcome::Resumed => format!(
            "Order {} resumed: {}/{} packed.",
            order.order_id,
            order.packed_items(),
            order.required_items()
        ),
    }
}

fn describe_scan<C: Clock>(session: &PackSession<C>, outcome: ScanOutcome) -> String {
    match outcome {
        ScanOutcome::Packed {
            order_id,
            identifier,
            packed,
            required,
        } => format!("{}: {}/{} (order {})", identifier, packed, required, order_id),
        ScanOutcome::OrderCompleted {
            order_id,
            identifier,
            duration,
        } => format!(
            "{}: order {} complete in {}. {} order(s) remaining.",
            identifier,
            order_id,
            format_age(duration),
            session.work().remaining_orders().len()
        ),
    }
}

fn say<W: Write>(out: &mut W, message: impl Display) -> Result<()> {
    writeln!(out, "{}", message).map_err(|e| PackError::Io(format!("failed to write output: {}", e)))
}
