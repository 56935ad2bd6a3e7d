//! End-of-session summary.

use crate::context::WorkUnitId;
use crate::locks::format_age;
use crate::snapshot::StateSnapshot;
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTiming {
    pub order_id: String,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDurations {
    pub total_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest: Option<OrderTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowest: Option<OrderTiming>,
}

/// Written once when a session finishes; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub work_unit_id: WorkUnitId,
    /// Earliest order start, if any order was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,
    pub finished_at: DateTime<FixedOffset>,
    pub session_duration_secs: i64,
    pub total_orders: usize,
    pub completed_orders: usize,
    pub remaining_orders: Vec<String>,
    pub total_items: u64,
    pub packed_items: u64,
    pub order_durations: OrderDurations,
}

impl SessionSummary {
    pub fn from_snapshot(
        snapshot: &StateSnapshot,
        remaining_orders: Vec<String>,
        finished_at: DateTime<FixedOffset>,
    ) -> Self {
        let started_at = snapshot
            .in_progress
            .values()
            .map(|o| o.started_at)
            .chain(snapshot.completed.iter().map(|o| o.started_at))
            .min();
        let session_duration_secs = started_at
            .map(|start| (finished_at - start).num_seconds().max(0))
            .unwrap_or(0);

        let mut durations = OrderDurations::default();
        for order in &snapshot.completed {
            durations.total_secs += order.duration_secs;
            let timing = || OrderTiming {
                order_id: order.order_id.clone(),
                duration_secs: order.duration_secs,
            };
            if durations
                .fastest
                .as_ref()
                .is_none_or(|f| order.duration_secs < f.duration_secs)
            {
                durations.fastest = Some(timing());
            }
            if durations
                .slowest
                .as_ref()
                .is_none_or(|s| order.duration_secs > s.duration_secs)
            {
                durations.slowest = Some(timing());
            }
        }
        if !snapshot.completed.is_empty() {
            durations.average_secs = Some(durations.total_secs / snapshot.completed.len() as i64);
        }

        Self {
            work_unit_id: snapshot.work_unit_id.clone(),
            started_at,
            finished_at,
            session_duration_secs,
            total_orders: snapshot.aggregate.total_orders,
            completed_orders: snapshot.aggregate.completed_orders,
            remaining_orders,
            total_items: snapshot.aggregate.total_items,
            packed_items: snapshot.aggregate.packed_items,
            order_durations: durations,
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session summary for {}", self.work_unit_id)?;
        writeln!(
            f,
            "  Orders: {}/{} completed",
            self.completed_orders, self.total_orders
        )?;
        writeln!(f, "  Items:  {}/{} packed", self.packed_items, self.total_items)?;
        writeln!(
            f,
            "  Time:   {}",
            format_age(Duration::seconds(self.session_duration_secs))
        )?;
        if let Some(avg) = self.order_durations.average_secs {
            writeln!(f, "  Average order: {}", format_age(Duration::seconds(avg)))?;
        }
        if let Some(fastest) = &self.order_durations.fastest {
            writeln!(
                f,
                "  Fastest order: {} ({})",
                fastest.order_id,
                format_age(Duration::seconds(fastest.duration_secs))
            )?;
        }
        if let Some(slowest) = &self.order_durations.slowest {
            writeln!(
                f,
                "  Slowest order: {} ({})",
                slowest.order_id,
                format_age(Duration::seconds(slowest.duration_secs))
            )?;
        }
        if !self.remaining_orders.is_empty() {
            writeln!(f, "  Remaining: {}", self.remaining_orders.join(", "))?;
        }
        Ok(())
    }
}
