//! Snapshot file I/O.

use super::model::{SCHEMA_VERSION, StateSnapshot};
use crate::context::{RootContext, WorkUnitId};
use crate::error::{PackError, Result};
use crate::fs::{StagedWrite, atomic_create, stage_write};
use crate::session::SessionSummary;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result of loading a unit's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedState {
    /// No snapshot has ever been saved for this unit.
    Empty,
    Snapshot(StateSnapshot),
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: u32,
}

/// Owns the `session_state.json` and `session_summary.json` files of every unit.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    ctx: RootContext,
}

impl SnapshotStore {
    pub fn new(ctx: RootContext) -> Self {
        Self { ctx }
    }

    pub fn state_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.ctx.state_path(unit)
    }

    /// Atomically replace the unit's snapshot.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The new snapshot is durable
    /// * `Err(PackError::SnapshotWrite)` - Nothing was replaced; the previous snapshot is intact
    pub fn save(&self, unit: &WorkUnitId, snapshot: &StateSnapshot) -> Result<()> {
        self.stage(unit, snapshot)?
            .commit()
            .map_err(|e| snapshot_write_error(unit, e))?;
        tracing::debug!(
            unit = %unit,
            packed = snapshot.aggregate.packed_items,
            completed_orders = snapshot.aggregate.completed_orders,
            "state saved"
        );
        Ok(())
    }

    /// Serialize and stage a snapshot without replacing the canonical file.
    pub fn stage(&self, unit: &WorkUnitId, snapshot: &StateSnapshot) -> Result<StagedWrite> {
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| PackError::SnapshotWrite {
            unit: unit.to_string(),
            reason: format!("failed to serialize state: {}", e),
        })?;
        stage_write(self.state_path(unit), json.as_bytes()).map_err(|e| snapshot_write_error(unit, e))
    }

    /// Load the last saved snapshot.
    ///
    /// A file that exists but does not parse (including an empty file) is
    /// `CorruptState`, never `Empty`.
    pub fn load(&self, unit: &WorkUnitId) -> Result<LoadedState> {
        let path = self.state_path(unit);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadedState::Empty),
            Err(e) => {
                return Err(PackError::Io(format!(
                    "failed to read state file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        parse_snapshot(&path, &content).map(LoadedState::Snapshot)
    }

    /// Move a corrupt snapshot aside so the unit can start over.
    ///
    /// Returns the new path of the quarantined file, or `None` if there was
    /// no snapshot. Never called implicitly.
    pub fn quarantine(
        &self,
        unit: &WorkUnitId,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<PathBuf>> {
        let path = self.state_path(unit);
        if !path.exists() {
            return Ok(None);
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("session_state.json");
        let target = path.with_file_name(format!(
            "{}.corrupt-{}",
            file_name,
            now.format("%Y%m%dT%H%M%S%z")
        ));

        fs::rename(&path, &target).map_err(|e| {
            PackError::Io(format!(
                "failed to move '{}' to '{}': {}",
                path.display(),
                target.display(),
                e
            ))
        })?;

        tracing::warn!(unit = %unit, moved_to = %target.display(), "state file quarantined");
        Ok(Some(target))
    }

    /// Write the end-of-session summary. A unit's summary is written only once.
    pub fn save_summary(&self, unit: &WorkUnitId, summary: &SessionSummary) -> Result<()> {
        let path = self.ctx.summary_path(unit);
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| PackError::Io(format!("failed to serialize session summary: {}", e)))?;

        if !atomic_create(&path, json.as_bytes())? {
            return Err(PackError::UserError(format!(
                "a session summary for work unit '{}' already exists at {}",
                unit,
                path.display()
            )));
        }
        Ok(())
    }

    pub fn load_summary(&self, unit: &WorkUnitId) -> Result<Option<SessionSummary>> {
        let path = self.ctx.summary_path(unit);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PackError::Io(format!(
                    "failed to read summary file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PackError::CorruptState {
                path,
                reason: e.to_string(),
            })
    }
}

fn parse_snapshot(path: &Path, content: &str) -> Result<StateSnapshot> {
    let corrupt = |reason: String| PackError::CorruptState {
        path: path.to_path_buf(),
        reason,
    };

    let header: VersionHeader = serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;
    if header.schema_version > SCHEMA_VERSION {
        return Err(corrupt(format!(
            "unsupported schema_version {} (this build reads up to {})",
            header.schema_version, SCHEMA_VERSION
        )));
    }

    serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))
}

fn snapshot_write_error(unit: &WorkUnitId, err: PackError) -> PackError {
    match err {
        PackError::SnapshotWrite { .. } => err,
        other => PackError::SnapshotWrite {
            unit: unit.to_string(),
            reason: other.to_string(),
        },
    }
}
