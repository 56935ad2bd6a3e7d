//! Versioned on-disk form of a work unit's packing progress.

use crate::context::WorkUnitId;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written by this build. Files with a higher version are refused.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete persisted progress of one work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: u32,
    pub work_unit_id: WorkUnitId,
    pub saved_at: DateTime<FixedOffset>,
    pub aggregate: Aggregate,
    pub in_progress: BTreeMap<String, InProgressOrder>,
    pub completed: Vec<CompletedOrder>,
}

/// Counters across the whole work unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub total_orders: usize,
    pub completed_orders: usize,
    pub total_items: u64,
    pub packed_items: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProgressOrder {
    pub started_at: DateTime<FixedOffset>,
    pub items: Vec<SnapshotItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub order_id: String,
    pub started_at: DateTime<FixedOffset>,
    pub completed_at: DateTime<FixedOffset>,
    /// Seconds from start to completion.
    pub duration_secs: i64,
    pub items: Vec<SnapshotItem>,
}

/// One order line as persisted: the identifier as it appears in the manifest,
/// required and packed counts, and the scan times that produced `packed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub identifier: String,
    pub required: u32,
    pub packed: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scanned_at: Vec<DateTime<FixedOffset>>,
}
