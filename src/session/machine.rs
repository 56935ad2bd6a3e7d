//! Order/item state machine for one work unit.

use super::manifest::{Manifest, normalize_identifier};
use super::order::{OrderState, OrderStatus};
use super::summary::SessionSummary;
use crate::clock::{Clock, SystemClock};
use crate::context::WorkUnitId;
use crate::error::{PackError, Result};
use crate::snapshot::{Aggregate, LoadedState, SCHEMA_VERSION, SnapshotStore, StateSnapshot};
use chrono::Duration;
use std::collections::BTreeMap;

/// How a session came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    /// No snapshot existed.
    Fresh,
    /// Progress was restored from the last snapshot.
    Resumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The order was already in progress and picked up where it left off.
    Resumed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// One more unit packed; the order still has items left.
    Packed {
        order_id: String,
        identifier: String,
        packed: u32,
        required: u32,
    },
    /// The scan completed the active order.
    OrderCompleted {
        order_id: String,
        identifier: String,
        duration: Duration,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Progress {
    in_progress: BTreeMap<String, OrderState>,
    completed: Vec<OrderState>,
    active_order: Option<String>,
}

impl Progress {
    fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        Self {
            in_progress: snapshot
                .in_progress
                .iter()
                .map(|(id, order)| (id.clone(), OrderState::from_in_progress(id, order)))
                .collect(),
            completed: snapshot
                .completed
                .iter()
                .map(OrderState::from_completed)
                .collect(),
            active_order: snapshot.aggregate.active_order_id.clone(),
        }
    }

    fn is_completed(&self, order_id: &str) -> bool {
        self.completed.iter().any(|o| o.order_id == order_id)
    }

    fn packed_items(&self) -> u64 {
        self.in_progress
            .values()
            .chain(self.completed.iter())
            .map(OrderState::packed_items)
            .sum()
    }
}

/// Packing progress of one work unit, persisted after every mutation.
///
/// Each mutation is applied to a copy of the current progress, saved, and
/// only then swapped in. A failed save returns `SnapshotWrite` with memory and
/// disk both still at the previous state.
#[derive(Debug)]
pub struct WorkSession<C: Clock = SystemClock> {
    unit: WorkUnitId,
    manifest: Manifest,
    store: SnapshotStore,
    clock: C,
    progress: Progress,
    resume_kind: ResumeKind,
}

impl<C: Clock> WorkSession<C> {
    /// Open a session, restoring the last snapshot if one exists.
    ///
    /// Persisted progress is restored as is, without reconciling it against
    /// the manifest.
    ///
    /// # Returns
    ///
    /// * `Ok(WorkSession)` - Fresh or resumed; see [`WorkSession::resume_kind`]
    /// * `Err(PackError::CorruptState)` - The snapshot exists but cannot be read
    pub fn resume(
        unit: WorkUnitId,
        manifest: Manifest,
        store: SnapshotStore,
        clock: C,
    ) -> Result<Self> {
        let (progress, resume_kind) = match store.load(&unit)? {
            LoadedState::Empty => (Progress::default(), ResumeKind::Fresh),
            LoadedState::Snapshot(snapshot) => {
                if snapshot.work_unit_id != unit {
                    tracing::warn!(
                        unit = %unit,
                        snapshot_unit = %snapshot.work_unit_id,
                        "snapshot names a different work unit"
                    );
                }
                (Progress::from_snapshot(&snapshot), ResumeKind::Resumed)
            }
        };

        tracing::info!(
            unit = %unit,
            resumed = resume_kind == ResumeKind::Resumed,
            in_progress = progress.in_progress.len(),
            completed = progress.completed.len(),
            "session opened"
        );

        Ok(Self {
            unit,
            manifest,
            store,
            clock,
            progress,
            resume_kind,
        })
    }

    pub fn unit(&self) -> &WorkUnitId {
        &self.unit
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn resume_kind(&self) -> ResumeKind {
        self.resume_kind
    }

    /// Make `order_id` the active order, starting it if needed.
    ///
    /// Switching away from another in-progress order leaves that order in
    /// progress.
    pub fn start_order(&mut self, order_id: &str) -> Result<StartOutcome> {
        let order = self
            .manifest
            .find_order(order_id)
            .ok_or_else(|| PackError::UnknownIdentifier(order_id.trim().to_string()))?;
        let id = order.order_id.clone();

        if self.progress.is_completed(&id) {
            return Err(PackError::AlreadyCompleted(id));
        }

        let mut next = self.progress.clone();
        let outcome = if next.in_progress.contains_key(&id) {
            StartOutcome::Resumed
        } else {
            let mut state = OrderState::unstarted(order);
            state.status = OrderStatus::InProgress;
            state.started_at = Some(self.clock.now());
            next.in_progress.insert(id.clone(), state);
            StartOutcome::Started
        };
        next.active_order = Some(id.clone());

        self.commit(next)?;
        tracing::info!(unit = %self.unit, order = %id, ?outcome, "order active");
        Ok(outcome)
    }

    /// Record one scan of `identifier` against the active order.
    ///
    /// Rejections (`NoActiveOrder`, `UnexpectedItem`, `QuantityExceeded`)
    /// change nothing and save nothing.
    pub fn scan_item(&mut self, identifier: &str) -> Result<ScanOutcome> {
        let Some(active) = self.progress.active_order.clone() else {
            return Err(PackError::NoActiveOrder);
        };
        let normalized = normalize_identifier(identifier);

        let mut next = self.progress.clone();
        let Some(order) = next.in_progress.get_mut(&active) else {
            return Err(PackError::NoActiveOrder);
        };
        let Some(item) = order.item_mut(&normalized) else {
            return Err(PackError::UnexpectedItem {
                order: active,
                item: identifier.trim().to_string(),
            });
        };
        if item.packed_quantity >= item.required_quantity {
            return Err(PackError::QuantityExceeded {
                order: active,
                item: item.raw_identifier.clone(),
                required: item.required_quantity,
            });
        }

        let now = self.clock.now();
        item.packed_quantity += 1;
        item.scanned_at.push(now);
        let packed = item.packed_quantity;
        let required = item.required_quantity;
        let raw = item.raw_identifier.clone();

        let outcome = if order.is_satisfied() {
            let mut done = next
                .in_progress
                .remove(&active)
                .ok_or(PackError::NoActiveOrder)?;
            done.status = OrderStatus::Completed;
            done.completed_at = Some(now);
            let duration = done.duration().unwrap_or_else(Duration::zero);
            next.completed.push(done);
            next.active_order = None;
            ScanOutcome::OrderCompleted {
                order_id: active,
                identifier: raw,
                duration,
            }
        } else {
            ScanOutcome::Packed {
                order_id: active,
                identifier: raw,
                packed,
                required,
            }
        };

        self.commit(next)?;
        if let ScanOutcome::OrderCompleted { order_id, .. } = &outcome {
            tracing::info!(unit = %self.unit, order = %order_id, "order completed");
        }
        Ok(outcome)
    }

    /// Current progress in its persisted form.
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot_of(&self.progress)
    }

    pub fn progress(&self) -> Aggregate {
        self.aggregate_of(&self.progress)
    }

    /// State of any order in the manifest, including unstarted ones.
    pub fn order(&self, order_id: &str) -> Option<OrderState> {
        let manifest_order = self.manifest.find_order(order_id)?;
        let id = &manifest_order.order_id;
        if let Some(state) = self.progress.in_progress.get(id) {
            return Some(state.clone());
        }
        if let Some(state) = self.progress.completed.iter().find(|o| &o.order_id == id) {
            return Some(state.clone());
        }
        Some(OrderState::unstarted(manifest_order))
    }

    pub fn active_order(&self) -> Option<&OrderState> {
        self.progress
            .active_order
            .as_ref()
            .and_then(|id| self.progress.in_progress.get(id))
    }

    /// Manifest orders not yet completed, in manifest order.
    pub fn remaining_orders(&self) -> Vec<&str> {
        self.manifest
            .orders()
            .iter()
            .map(|o| o.order_id.as_str())
            .filter(|id| !self.progress.is_completed(id))
            .collect()
    }

    pub fn completed_orders(&self) -> &[OrderState] {
        &self.progress.completed
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_orders().is_empty()
    }

    /// End the session and persist its summary.
    pub fn finish(self) -> Result<SessionSummary> {
        let now = self.clock.now();
        let remaining = self
            .remaining_orders()
            .into_iter()
            .map(str::to_string)
            .collect();
        let summary = SessionSummary::from_snapshot(&self.snapshot(), remaining, now);
        self.store.save_summary(&self.unit, &summary)?;
        tracing::info!(
            unit = %self.unit,
            completed = summary.completed_orders,
            total = summary.total_orders,
            "session finished"
        );
        Ok(summary)
    }

    fn commit(&mut self, next: Progress) -> Result<()> {
        let snapshot = self.snapshot_of(&next);
        self.store.save(&self.unit, &snapshot)?;
        self.progress = next;
        Ok(())
    }

    fn aggregate_of(&self, progress: &Progress) -> Aggregate {
        Aggregate {
            total_orders: self.manifest.orders().len(),
            completed_orders: progress.completed.len(),
            total_items: self.manifest.total_items(),
            packed_items: progress.packed_items(),
            active_order_id: progress.active_order.clone(),
        }
    }

    fn snapshot_of(&self, progress: &Progress) -> StateSnapshot {
        let now = self.clock.now();
        StateSnapshot {
            schema_version: SCHEMA_VERSION,
            work_unit_id: self.unit.clone(),
            saved_at: now,
            aggregate: self.aggregate_of(progress),
            in_progress: progress
                .in_progress
                .iter()
                .map(|(id, order)| (id.clone(), order.to_in_progress(now)))
                .collect(),
            completed: progress
                .completed
                .iter()
                .map(|order| order.to_completed(now))
                .collect(),
        }
    }
}
