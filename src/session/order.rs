//! In-memory order and item progress.

use super::manifest::{ManifestOrder, normalize_identifier};
use crate::snapshot::{CompletedOrder, InProgressOrder, SnapshotItem};
use chrono::{DateTime, Duration, FixedOffset};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Unstarted,
    InProgress,
    Completed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Unstarted => write!(f, "unstarted"),
            OrderStatus::InProgress => write!(f, "in progress"),
            OrderStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemState {
    pub raw_identifier: String,
    pub normalized_identifier: String,
    pub required_quantity: u32,
    pub packed_quantity: u32,
    pub scanned_at: Vec<DateTime<FixedOffset>>,
}

impl ItemState {
    pub fn is_complete(&self) -> bool {
        self.packed_quantity == self.required_quantity
    }

    pub fn remaining(&self) -> u32 {
        self.required_quantity.saturating_sub(self.packed_quantity)
    }

    fn from_snapshot(item: &SnapshotItem) -> Self {
        Self {
            raw_identifier: item.identifier.clone(),
            normalized_identifier: normalize_identifier(&item.identifier),
            required_quantity: item.required,
            packed_quantity: item.packed,
            scanned_at: item.scanned_at.clone(),
        }
    }

    fn to_snapshot(&self) -> SnapshotItem {
        SnapshotItem {
            identifier: self.raw_identifier.clone(),
            required: self.required_quantity,
            packed: self.packed_quantity,
            scanned_at: self.scanned_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderState {
    pub order_id: String,
    pub status: OrderStatus,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// Duration recorded in a loaded snapshot. Written back unchanged.
    pub recorded_duration_secs: Option<i64>,
    pub items: Vec<ItemState>,
}

impl OrderState {
    /// A fresh order with nothing packed.
    pub fn unstarted(order: &ManifestOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: OrderStatus::Unstarted,
            started_at: None,
            completed_at: None,
            recorded_duration_secs: None,
            items: order
                .items
                .iter()
                .map(|i| ItemState {
                    raw_identifier: i.identifier.clone(),
                    normalized_identifier: normalize_identifier(&i.identifier),
                    required_quantity: i.quantity,
                    packed_quantity: 0,
                    scanned_at: Vec::new(),
                })
                .collect(),
        }
    }

    /// Every item packed exactly to its required quantity.
    pub fn is_satisfied(&self) -> bool {
        self.items.iter().all(ItemState::is_complete)
    }

    pub fn item(&self, normalized: &str) -> Option<&ItemState> {
        self.items
            .iter()
            .find(|i| i.normalized_identifier == normalized)
    }

    pub(crate) fn item_mut(&mut self, normalized: &str) -> Option<&mut ItemState> {
        self.items
            .iter_mut()
            .find(|i| i.normalized_identifier == normalized)
    }

    pub fn packed_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.packed_quantity)).sum()
    }

    pub fn required_items(&self) -> u64 {
        self.items
            .iter()
            .map(|i| u64::from(i.required_quantity))
            .sum()
    }

    /// Start to completion, for completed orders.
    ///
    /// A duration loaded from a snapshot is reported as recorded.
    pub fn duration(&self) -> Option<Duration> {
        if let Some(secs) = self.recorded_duration_secs {
            return Some(Duration::seconds(secs));
        }
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub(crate) fn from_in_progress(order_id: &str, order: &InProgressOrder) -> Self {
        Self {
            order_id: order_id.to_string(),
            status: OrderStatus::InProgress,
            started_at: Some(order.started_at),
            completed_at: None,
            recorded_duration_secs: None,
            items: order.items.iter().map(ItemState::from_snapshot).collect(),
        }
    }

    pub(crate) fn from_completed(order: &CompletedOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: OrderStatus::Completed,
            started_at: Some(order.started_at),
            completed_at: Some(order.completed_at),
            recorded_duration_secs: Some(order.duration_secs),
            items: order.items.iter().map(ItemState::from_snapshot).collect(),
        }
    }

    /// Snapshot form of an in-progress order. `started_at` falls back to
    /// `now` only for an order that was never started.
    pub(crate) fn to_in_progress(&self, now: DateTime<FixedOffset>) -> InProgressOrder {
        InProgressOrder {
            started_at: self.started_at.unwrap_or(now),
            items: self.items.iter().map(ItemState::to_snapshot).collect(),
        }
    }

    pub(crate) fn to_completed(&self, now: DateTime<FixedOffset>) -> CompletedOrder {
        let started_at = self.started_at.unwrap_or(now);
        let completed_at = self.completed_at.unwrap_or(now);
        CompletedOrder {
            order_id: self.order_id.clone(),
            started_at,
            completed_at,
            duration_secs: self
                .recorded_duration_secs
                .unwrap_or_else(|| (completed_at - started_at).num_seconds()),
            items: self.items.iter().map(ItemState::to_snapshot).collect(),
        }
    }
}
