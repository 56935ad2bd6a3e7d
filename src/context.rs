//! Root directory and per-work-unit path resolution for packguard.
//!
//! Every station points at the same root directory on the shared volume. Each
//! work unit (packing list) gets its own subdirectory holding its manifest,
//! lock file, state snapshot and final summary:
//!
//! ```text
//! {root}/packguard.yaml
//! {root}/{unit}/manifest.json
//! {root}/{unit}/session.lock
//! {root}/{unit}/session_state.json
//! {root}/{unit}/session_summary.json
//! ```
//!
//! All components resolve paths through this module so they agree on layout.

use crate::error::{PackError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file name at the root.
pub const CONFIG_FILE: &str = "packguard.yaml";

/// Lock file name within a work unit directory.
pub const LOCK_FILE: &str = "session.lock";

/// Snapshot file name within a work unit directory.
pub const STATE_FILE: &str = "session_state.json";

/// Summary file name within a work unit directory.
pub const SUMMARY_FILE: &str = "session_summary.json";

/// Manifest file name within a work unit directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Identifier of one lockable, resumable work unit.
///
/// Used directly as a directory name, so it must be a single plain path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkUnitId(String);

impl WorkUnitId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();

        if trimmed.is_empty() {
            return Err(PackError::UserError("work unit id must not be empty".to_string()));
        }
        if trimmed.starts_with('.') {
            return Err(PackError::UserError(format!(
                "invalid work unit id '{}': must not start with '.'",
                trimmed
            )));
        }
        if trimmed.contains(['/', '\\', '\0']) {
            return Err(PackError::UserError(format!(
                "invalid work unit id '{}': must not contain path separators",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkUnitId {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for WorkUnitId {
    type Error = PackError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<WorkUnitId> for String {
    fn from(id: WorkUnitId) -> Self {
        id.0
    }
}

/// Resolved root directory shared by all stations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootContext {
    /// Absolute path to the shared root directory.
    pub root: PathBuf,
}

impl RootContext {
    /// Resolve the root from an explicit path, or the current directory when absent.
    ///
    /// # Returns
    ///
    /// * `Ok(RootContext)` - The root exists and is a directory
    /// * `Err(PackError::UserError)` - The root is missing or not a directory
    pub fn resolve(root: Option<&Path>) -> Result<Self> {
        let root = match root {
            Some(path) => path.to_path_buf(),
            None => env::current_dir().map_err(|e| {
                PackError::UserError(format!("failed to get current working directory: {}", e))
            })?,
        };

        if !root.is_dir() {
            return Err(PackError::UserError(format!(
                "work unit root '{}' does not exist or is not a directory.\n\
                 Pass --root or set PACKGUARD_ROOT to the shared packing list folder.",
                root.display()
            )));
        }

        let root = root.canonicalize().unwrap_or(root);
        Ok(Self { root })
    }

    /// Build a context without checking the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn unit_dir(&self, unit: &WorkUnitId) -> PathBuf {
        self.root.join(unit.as_str())
    }

    pub fn lock_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.unit_dir(unit).join(LOCK_FILE)
    }

    pub fn state_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.unit_dir(unit).join(STATE_FILE)
    }

    pub fn summary_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.unit_dir(unit).join(SUMMARY_FILE)
    }

    pub fn manifest_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.unit_dir(unit).join(MANIFEST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn work_unit_id_accepts_plain_names() {
        let id = WorkUnitId::new("  PL-2026-0042 ").unwrap();
        assert_eq!(id.as_str(), "PL-2026-0042");
        assert_eq!(id.to_string(), "PL-2026-0042");
    }

    #[test]
    fn work_unit_id_rejects_path_tricks() {
        for bad in ["", "   ", "..", ".hidden", "a/b", "a\\b"] {
            assert!(WorkUnitId::new(bad).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn work_unit_id_deserialization_validates() {
        let ok: WorkUnitId = serde_json::from_str("\"PL-1\"").unwrap();
        assert_eq!(ok.as_str(), "PL-1");
        assert!(serde_json::from_str::<WorkUnitId>("\"../etc\"").is_err());
    }

    #[test]
    fn paths_are_scoped_to_unit_dir() {
        let ctx = RootContext::new("/mnt/lists");
        let unit = WorkUnitId::new("PL-1").unwrap();

        assert_eq!(ctx.config_path(), PathBuf::from("/mnt/lists/packguard.yaml"));
        assert_eq!(ctx.lock_path(&unit), PathBuf::from("/mnt/lists/PL-1/session.lock"));
        assert_eq!(
            ctx.state_path(&unit),
            PathBuf::from("/mnt/lists/PL-1/session_state.json")
        );
        assert_eq!(
            ctx.summary_path(&unit),
            PathBuf::from("/mnt/lists/PL-1/session_summary.json")
        );
        assert_eq!(ctx.manifest_path(&unit), PathBuf::from("/mnt/lists/PL-1/manifest.json"));
    }

    #[test]
    fn resolve_requires_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(RootContext::resolve(Some(temp_dir.path())).is_ok());

        let missing = temp_dir.path().join("nope");
        let err = RootContext::resolve(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
