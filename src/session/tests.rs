//! Tests for packing sessions.

use super::*;
use crate::clock::FakeClock;
use crate::context::{RootContext, WorkUnitId};
use crate::error::PackError;
use crate::locks::{HolderIdentity, LockStore, StalenessPolicy, UnitLockState};
use crate::snapshot::{LoadedState, SnapshotStore};
use chrono::{DateTime, Duration, FixedOffset};
use std::fs;
use tempfile::TempDir;

fn t0() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-03-02T08:00:00+01:00").unwrap()
}

fn unit(id: &str) -> WorkUnitId {
    WorkUnitId::new(id).unwrap()
}

/// SO-1 needs A x2 and B x1; SO-2 needs C x1.
fn sample_manifest() -> Manifest {
    Manifest::from_json(
        r#"{
            "orders": [
                {"order_id": "SO-1", "items": [
                    {"identifier": "SKU-A", "quantity": 2},
                    {"identifier": "SKU-B", "quantity": 1}
                ]},
                {"order_id": "SO-2", "items": [
                    {"identifier": "SKU-C", "quantity": 1}
                ]}
            ]
        }"#,
    )
    .unwrap()
}

struct Fixture {
    _temp_dir: TempDir,
    ctx: RootContext,
    store: SnapshotStore,
    clock: FakeClock,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RootContext::new(temp_dir.path());
        Self {
            store: SnapshotStore::new(ctx.clone()),
            ctx,
            clock: FakeClock::at(t0()),
            _temp_dir: temp_dir,
        }
    }

    fn session(&self) -> WorkSession<FakeClock> {
        WorkSession::resume(
            unit("PL-1"),
            sample_manifest(),
            self.store.clone(),
            self.clock.clone(),
        )
        .unwrap()
    }

    fn saved(&self) -> LoadedState {
        self.store.load(&unit("PL-1")).unwrap()
    }
}

// ============================================================================
// Manifest
// ============================================================================

#[test]
fn test_normalize_identifier() {
    assert_eq!(normalize_identifier("  sku-a\n"), "SKU-A");
    assert_eq!(normalize_identifier("ab 12 cd"), "AB12CD");
    assert_eq!(normalize_identifier("   "), "");
}

#[test]
fn test_manifest_merges_duplicate_lines() {
    let manifest = Manifest::from_json(
        r#"{"orders": [{"order_id": "SO-1", "items": [
            {"identifier": "sku-a", "quantity": 1},
            {"identifier": "SKU-A ", "quantity": 2}
        ]}]}"#,
    )
    .unwrap();

    let order = manifest.find_order("so-1").unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].identifier, "sku-a");
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(manifest.total_items(), 3);
}

#[test]
fn test_manifest_rejects_zero_quantity() {
    let err = Manifest::from_json(
        r#"{"orders": [{"order_id": "SO-1", "items": [{"identifier": "A", "quantity": 0}]}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, PackError::UserError(msg) if msg.contains("quantity 0")));
}

#[test]
fn test_manifest_rejects_duplicate_orders() {
    let err = Manifest::from_json(
        r#"{"orders": [
            {"order_id": "SO-1", "items": [{"identifier": "A", "quantity": 1}]},
            {"order_id": "so-1", "items": [{"identifier": "B", "quantity": 1}]}
        ]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, PackError::UserError(msg) if msg.contains("more than once")));
}

#[test]
fn test_manifest_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("manifest.json");
    fs::write(
        &path,
        r#"{"orders": [{"order_id": "SO-9", "items": [{"identifier": "X", "quantity": 4}]}]}"#,
    )
    .unwrap();

    let manifest = Manifest::load(&path).unwrap();
    assert_eq!(manifest.orders().len(), 1);

    let missing = Manifest::load(temp_dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, PackError::UserError(_)));
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_fresh_session_has_nothing_packed() {
    let fx = Fixture::new();
    let session = fx.session();

    assert_eq!(session.resume_kind(), ResumeKind::Fresh);
    assert!(session.active_order().is_none());
    assert_eq!(session.remaining_orders(), vec!["SO-1", "SO-2"]);
    assert_eq!(
        session.order("SO-1").unwrap().status,
        OrderStatus::Unstarted
    );
    let progress = session.progress();
    assert_eq!(progress.total_orders, 2);
    assert_eq!(progress.total_items, 4);
    assert_eq!(progress.packed_items, 0);
}

#[test]
fn test_order_completes_exactly_when_every_item_is_packed() {
    let fx = Fixture::new();
    let mut session = fx.session();

    assert_eq!(session.start_order("SO-1").unwrap(), StartOutcome::Started);

    fx.clock.advance(Duration::seconds(10));
    let outcome = session.scan_item("SKU-A").unwrap();
    assert!(matches!(outcome, ScanOutcome::Packed { packed: 1, required: 2, .. }));

    fx.clock.advance(Duration::seconds(10));
    assert!(matches!(
        session.scan_item("SKU-B").unwrap(),
        ScanOutcome::Packed { packed: 1, required: 1, .. }
    ));
    assert_eq!(
        session.order("SO-1").unwrap().status,
        OrderStatus::InProgress
    );

    fx.clock.advance(Duration::seconds(10));
    match session.scan_item(" sku-a ").unwrap() {
        ScanOutcome::OrderCompleted {
            order_id, duration, ..
        } => {
            assert_eq!(order_id, "SO-1");
            assert_eq!(duration, Duration::seconds(30));
        }
        other => panic!("expected OrderCompleted, got {:?}", other),
    }

    let order = session.order("SO-1").unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.completed_at, Some(t0() + Duration::seconds(30)));
    assert!(session.active_order().is_none());
    assert_eq!(session.remaining_orders(), vec!["SO-2"]);
    assert_eq!(session.progress().packed_items, 3);
}

#[test]
fn test_over_scan_is_rejected_without_saving() {
    let fx = Fixture::new();
    let mut session = fx.session();
    session.start_order("SO-1").unwrap();
    session.scan_item("SKU-B").unwrap();
    let before = fx.saved();

    fx.clock.advance(Duration::seconds(5));
    let err = session.scan_item("SKU-B").unwrap_err();

    assert!(matches!(
        err,
        PackError::QuantityExceeded { ref order, ref item, required: 1 }
            if order == "SO-1" && item == "SKU-B"
    ));
    let item = session
        .active_order()
        .and_then(|o| o.item("SKU-B"))
        .unwrap()
        .clone();
    assert_eq!(item.packed_quantity, 1);
    assert_eq!(fx.saved(), before);
}

#[test]
fn test_scan_rejections() {
    let fx = Fixture::new();
    let mut session = fx.session();

    assert!(matches!(
        session.scan_item("SKU-A"),
        Err(PackError::NoActiveOrder)
    ));
    assert!(matches!(
        session.start_order("SO-404"),
        Err(PackError::UnknownIdentifier(id)) if id == "SO-404"
    ));

    session.start_order("SO-2").unwrap();
    assert!(matches!(
        session.scan_item("SKU-A"),
        Err(PackError::UnexpectedItem { ref order, ref item }) if order == "SO-2" && item == "SKU-A"
    ));

    session.scan_item("SKU-C").unwrap();
    assert!(matches!(
        session.start_order("SO-2"),
        Err(PackError::AlreadyCompleted(id)) if id == "SO-2"
    ));
    // Completing an order clears the active pointer.
    assert!(matches!(
        session.scan_item("SKU-C"),
        Err(PackError::NoActiveOrder)
    ));
}

#[test]
fn test_switching_orders_keeps_progress() {
    let fx = Fixture::new();
    let mut session = fx.session();

    session.start_order("SO-1").unwrap();
    session.scan_item("SKU-A").unwrap();
    session.start_order("SO-2").unwrap();

    assert_eq!(session.active_order().unwrap().order_id, "SO-2");
    let so1 = session.order("SO-1").unwrap();
    assert_eq!(so1.status, OrderStatus::InProgress);
    assert_eq!(so1.item("SKU-A").unwrap().packed_quantity, 1);

    fx.clock.advance(Duration::seconds(60));
    assert_eq!(session.start_order("SO-1").unwrap(), StartOutcome::Resumed);
    let so1 = session.active_order().unwrap();
    assert_eq!(so1.started_at, Some(t0()));
    assert_eq!(so1.item("SKU-A").unwrap().packed_quantity, 1);
}

#[test]
fn test_every_accepted_mutation_is_saved() {
    let fx = Fixture::new();
    let mut session = fx.session();
    assert_eq!(fx.saved(), LoadedState::Empty);

    session.start_order("SO-1").unwrap();
    assert_eq!(fx.saved(), LoadedState::Snapshot(session.snapshot()));

    session.scan_item("SKU-A").unwrap();
    let LoadedState::Snapshot(saved) = fx.saved() else {
        panic!("expected a snapshot");
    };
    assert_eq!(saved.aggregate.packed_items, 1);
    assert_eq!(saved.aggregate.active_order_id.as_deref(), Some("SO-1"));
    assert_eq!(saved.in_progress["SO-1"].items[0].scanned_at, vec![t0()]);
}

#[test]
fn test_failed_save_leaves_memory_unchanged() {
    let fx = Fixture::new();
    let mut session = fx.session();
    session.start_order("SO-1").unwrap();
    let before = session.snapshot();

    // Replace the state file with a directory so the next rename fails.
    let state_path = fx.store.state_path(&unit("PL-1"));
    fs::remove_file(&state_path).unwrap();
    fs::create_dir(&state_path).unwrap();

    let err = session.scan_item("SKU-A").unwrap_err();
    assert!(matches!(err, PackError::SnapshotWrite { .. }));
    assert!(!err.is_scan_rejection());
    assert_eq!(session.snapshot(), before);

    fs::remove_dir(&state_path).unwrap();
    assert!(matches!(
        session.scan_item("SKU-A").unwrap(),
        ScanOutcome::Packed { packed: 1, .. }
    ));
}

// ============================================================================
// Resume
// ============================================================================

#[test]
fn test_resume_restores_exact_progress() {
    let fx = Fixture::new();
    let expected = {
        let mut session = fx.session();
        session.start_order("SO-2").unwrap();
        session.scan_item("SKU-C").unwrap();
        fx.clock.advance(Duration::seconds(20));
        session.start_order("SO-1").unwrap();
        fx.clock.advance(Duration::seconds(5));
        session.scan_item("SKU-A").unwrap();
        session.snapshot()
    };

    let resumed = fx.session();

    assert_eq!(resumed.resume_kind(), ResumeKind::Resumed);
    assert_eq!(resumed.snapshot(), expected);
    assert_eq!(resumed.active_order().unwrap().order_id, "SO-1");
    assert_eq!(
        resumed.order("SO-2").unwrap().status,
        OrderStatus::Completed
    );
    assert_eq!(resumed.remaining_orders(), vec!["SO-1"]);
}

#[test]
fn test_resume_keeps_recorded_durations() {
    let fx = Fixture::new();
    {
        let mut session = fx.session();
        session.start_order("SO-2").unwrap();
        fx.clock.advance(Duration::seconds(30));
        session.scan_item("SKU-C").unwrap();
    }

    let LoadedState::Snapshot(mut snapshot) = fx.saved() else {
        panic!("expected a saved snapshot");
    };
    assert_eq!(snapshot.completed[0].duration_secs, 30);
    snapshot.completed[0].duration_secs = 999;
    fx.store.save(&unit("PL-1"), &snapshot).unwrap();

    let mut resumed = fx.session();
    assert_eq!(
        resumed.order("SO-2").unwrap().duration(),
        Some(Duration::seconds(999))
    );
    assert_eq!(resumed.snapshot().completed[0].duration_secs, 999);

    resumed.start_order("SO-1").unwrap();
    let LoadedState::Snapshot(saved) = fx.saved() else {
        panic!("expected a saved snapshot");
    };
    assert_eq!(saved.completed[0].order_id, "SO-2");
    assert_eq!(saved.completed[0].duration_secs, 999);
}

#[test]
fn test_resume_continues_interrupted_order() {
    let fx = Fixture::new();
    {
        let mut session = fx.session();
        session.start_order("SO-1").unwrap();
        session.scan_item("SKU-A").unwrap();
    }

    let mut session = fx.session();
    session.scan_item("SKU-A").unwrap();
    assert!(matches!(
        session.scan_item("SKU-B").unwrap(),
        ScanOutcome::OrderCompleted { .. }
    ));
}

#[test]
fn test_resume_refuses_corrupt_state() {
    let fx = Fixture::new();
    let path = fx.store.state_path(&unit("PL-1"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{").unwrap();

    let err = WorkSession::resume(
        unit("PL-1"),
        sample_manifest(),
        fx.store.clone(),
        fx.clock.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, PackError::CorruptState { .. }));
    assert!(path.exists());
}

// ============================================================================
// Summary
// ============================================================================

#[test]
fn test_finish_writes_summary() {
    let fx = Fixture::new();
    let mut session = fx.session();

    session.start_order("SO-2").unwrap();
    fx.clock.advance(Duration::seconds(15));
    session.scan_item("SKU-C").unwrap();

    session.start_order("SO-1").unwrap();
    for item in ["SKU-A", "SKU-B", "SKU-A"] {
        fx.clock.advance(Duration::seconds(20));
        session.scan_item(item).unwrap();
    }
    fx.clock.advance(Duration::seconds(5));

    let summary = session.finish().unwrap();

    assert_eq!(summary.completed_orders, 2);
    assert_eq!(summary.total_orders, 2);
    assert!(summary.remaining_orders.is_empty());
    assert_eq!(summary.packed_items, 4);
    assert_eq!(summary.started_at, Some(t0()));
    assert_eq!(summary.session_duration_secs, 80);
    assert_eq!(summary.order_durations.total_secs, 75);
    assert_eq!(summary.order_durations.average_secs, Some(37));
    assert_eq!(
        summary.order_durations.fastest,
        Some(OrderTiming {
            order_id: "SO-2".to_string(),
            duration_secs: 15
        })
    );
    assert_eq!(
        summary.order_durations.slowest.as_ref().unwrap().order_id,
        "SO-1"
    );
    assert_eq!(fx.store.load_summary(&unit("PL-1")).unwrap(), Some(summary));
}

#[test]
fn test_summary_of_partial_session_lists_remaining_orders() {
    let fx = Fixture::new();
    let mut session = fx.session();
    session.start_order("SO-1").unwrap();
    session.scan_item("SKU-A").unwrap();

    let summary = session.finish().unwrap();

    assert_eq!(summary.completed_orders, 0);
    assert_eq!(summary.remaining_orders, vec!["SO-1", "SO-2"]);
    assert_eq!(summary.order_durations.average_secs, None);
    assert!(summary.to_string().contains("Remaining: SO-1, SO-2"));
}

// ============================================================================
// Pack session
// ============================================================================

fn lock_store(fx: &Fixture) -> LockStore<FakeClock> {
    LockStore::with_clock(fx.ctx.clone(), StalenessPolicy::default(), fx.clock.clone())
}

fn station(n: u32) -> HolderIdentity {
    HolderIdentity::new(format!("station-{}", n), "packer", n)
}

#[test]
fn test_pack_session_holds_lock_until_closed() {
    let fx = Fixture::new();
    let locks = lock_store(&fx);
    let pl = unit("PL-1");

    let mut pack = PackSession::open_with(
        locks.clone(),
        station(1),
        pl.clone(),
        sample_manifest(),
        fx.clock.clone(),
    )
    .unwrap();
    pack.work_mut().start_order("SO-2").unwrap();
    assert!(matches!(locks.status(&pl).unwrap(), UnitLockState::Held { .. }));

    let err = PackSession::open_with(
        locks.clone(),
        station(2),
        pl.clone(),
        sample_manifest(),
        fx.clock.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, PackError::LockConflict { .. }));

    pack.close().unwrap();
    assert_eq!(locks.status(&pl).unwrap(), UnitLockState::Free);

    let reopened = PackSession::open_with(
        locks.clone(),
        station(2),
        pl.clone(),
        sample_manifest(),
        fx.clock.clone(),
    )
    .unwrap();
    assert_eq!(reopened.work().resume_kind(), ResumeKind::Resumed);
    assert_eq!(reopened.work().active_order().unwrap().order_id, "SO-2");
}

#[test]
fn test_pack_session_releases_lock_on_corrupt_state() {
    let fx = Fixture::new();
    let locks = lock_store(&fx);
    let pl = unit("PL-1");
    let path = fx.store.state_path(&pl);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "garbage").unwrap();

    let err = PackSession::open_with(
        locks.clone(),
        station(1),
        pl.clone(),
        sample_manifest(),
        fx.clock.clone(),
    )
    .unwrap_err();

    assert!(matches!(err, PackError::CorruptState { .. }));
    assert_eq!(locks.status(&pl).unwrap(), UnitLockState::Free);
}

#[test]
fn test_pack_session_finish_releases_lock() {
    let fx = Fixture::new();
    let locks = lock_store(&fx);
    let pl = unit("PL-1");

    let mut pack = PackSession::open_with(
        locks.clone(),
        station(1),
        pl.clone(),
        sample_manifest(),
        fx.clock.clone(),
    )
    .unwrap();
    pack.work_mut().start_order("SO-2").unwrap();
    pack.work_mut().scan_item("SKU-C").unwrap();

    let summary = pack.finish().unwrap();
    assert_eq!(summary.completed_orders, 1);
    assert_eq!(locks.status(&pl).unwrap(), UnitLockState::Free);
}
