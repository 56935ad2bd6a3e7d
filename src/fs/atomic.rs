//! Atomic filesystem operations for packguard.
//!
//! Lock files and state snapshots live on a volume shared by several packing
//! stations, so no reader may ever observe a half-written file.
//!
//! # Implementation Strategy
//!
//! All writes follow this pattern:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Move it into place: `rename()` to replace, `hard_link()` to create exclusively
//! 4. Sync the parent directory (POSIX only)
//!
//! The two steps are exposed separately through [`StagedWrite`] so that callers
//! (and tests) can abandon a write after staging it; dropping an uncommitted
//! stage removes the temporary file and leaves the target untouched.
//!
//! # Important Notes
//!
//! - Source and destination must be on the same filesystem for atomic rename,
//!   which is why the temporary file is a sibling of the target.
//! - Temporary names carry the host, the process id and a time-based nonce
//!   (`.{filename}.{host}.{pid}.{nonce}.tmp`). They are opened with
//!   `create_new`, and a name that already exists is skipped, so a write never
//!   truncates or links another station's temporary file.
//! - On crash, a temporary file may remain. It is never read back.

use crate::error::{PackError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh names tried before staging gives up.
const MAX_TEMP_ATTEMPTS: u32 = 16;

/// A fully written and synced temporary file waiting to be moved into place.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of the temporary file holding the staged content.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replace the target with the staged content.
    pub fn commit(self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| {
            let _ = fs::remove_file(&self.temp_path);
            PackError::Io(format!(
                "failed to atomically replace '{}': {}",
                self.target.display(),
                e
            ))
        })?;
        sync_parent(&self.target);
        Ok(())
    }

    /// Move the staged content into place only if the target does not exist.
    ///
    /// Returns `Ok(false)` if another writer created the target first.
    pub fn commit_exclusive(self) -> Result<bool> {
        match fs::hard_link(&self.temp_path, &self.target) {
            Ok(()) => {
                sync_parent(&self.target);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => {
                // Some network filesystems refuse hard links; fall back to an
                // exclusive create, which may briefly expose an empty file.
                tracing::debug!(
                    path = %self.target.display(),
                    error = %e,
                    "hard link unavailable, falling back to exclusive create"
                );
                let content = fs::read(&self.temp_path).map_err(|e| {
                    PackError::Io(format!(
                        "failed to read staged file '{}': {}",
                        self.temp_path.display(),
                        e
                    ))
                })?;
                create_new_and_write(&self.target, &content)
            }
        }
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        // Uncommitted content, or the second name left behind by a hard link.
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Write content to a synced temporary file next to `path` without touching `path`.
pub fn stage_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<StagedWrite> {
    let path = path.as_ref();
    stage_with(path, content, || generate_temp_path(path))
}

fn stage_with<F>(path: &Path, content: &[u8], candidate: F) -> Result<StagedWrite>
where
    F: FnMut() -> Result<PathBuf>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            PackError::Io(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let (temp_path, file) = create_unique(candidate)?;
    write_and_sync(file, &temp_path, content)?;

    Ok(StagedWrite {
        temp_path,
        target: path.to_path_buf(),
    })
}

/// Atomically write bytes to a file, replacing any previous content.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    stage_write(path, content)?.commit()
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Atomically create a file with the given content.
///
/// Returns `Ok(false)` without modifying anything if the file already exists.
pub fn atomic_create<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<bool> {
    stage_write(path, content)?.commit_exclusive()
}

/// Generate a temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PackError::Io(format!("invalid file path '{}'", target.display())))?;

    let temp_name = format!(
        ".{}.{}.{}.{}.tmp",
        filename,
        host_tag(),
        std::process::id(),
        nonce()
    );
    Ok(parent.join(temp_name))
}

/// Hostname reduced to characters that are safe in a file name.
fn host_tag() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_default();
        let tag: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        if tag.is_empty() { "unknown".to_string() } else { tag }
    })
}

/// Wall-clock nanoseconds plus a per-process sequence number.
fn nonce() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{}", nanos, seq)
}

/// Open the first candidate name that does not exist yet.
fn create_unique<F>(mut candidate: F) -> Result<(PathBuf, File)>
where
    F: FnMut() -> Result<PathBuf>,
{
    for _ in 0..MAX_TEMP_ATTEMPTS {
        let path = candidate()?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "temporary name taken, trying another");
            }
            Err(e) => {
                return Err(PackError::Io(format!(
                    "failed to create temporary file '{}': {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    Err(PackError::Io(format!(
        "failed to find an unused temporary file name after {} attempts",
        MAX_TEMP_ATTEMPTS
    )))
}

/// Write content to a freshly created temporary file and sync to disk.
fn write_and_sync(mut file: File, path: &Path, content: &[u8]) -> Result<()> {
    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        PackError::Io(format!("failed to write to temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        PackError::Io(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

fn create_new_and_write(path: &Path, content: &[u8]) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(PackError::Io(format!(
                "failed to create '{}': {}",
                path.display(),
                e
            )));
        }
    };

    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(path);
            PackError::Io(format!("failed to write '{}': {}", path.display(), e))
        })?;

    sync_parent(path);
    Ok(true)
}

/// Sync the parent directory so the new directory entry is persisted.
#[cfg(unix)]
fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        atomic_write(&file_path, b"hello world").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        fs::write(&file_path, "original content").unwrap();
        atomic_write_file(&file_path, "new content").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "new content");
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("PL-001").join("session_state.json");

        atomic_write(&file_path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[test]
    fn test_abandoned_stage_leaves_target_intact() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("state.json");
        fs::write(&file_path, "previous").unwrap();

        let staged = stage_write(&file_path, b"half-finished replacement").unwrap();
        assert!(staged.temp_path().exists());
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "previous");

        drop(staged);

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "previous");
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_temp_paths_are_unique_siblings() {
        let target = Path::new("/some/path/file.txt");
        let a = generate_temp_path(target).unwrap();
        let b = generate_temp_path(target).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent().unwrap(), Path::new("/some/path"));
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".file.txt."));
        assert!(name.ends_with(".tmp"));
        assert!(name.contains(&format!(".{}.{}.", host_tag(), std::process::id())));
    }

    #[test]
    fn test_host_tag_is_a_single_path_component() {
        let tag = host_tag();
        assert!(!tag.is_empty());
        assert!(tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_exclusive_create_skips_foreign_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("session.lock");

        // Another station is midway through its own write under this name.
        let foreign_path = temp_dir.path().join(".session.lock.station-2.4242.0.tmp");
        let mut foreign = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&foreign_path)
            .unwrap();
        foreign.write_all(b"remote-partial").unwrap();

        let mut names = vec![foreign_path.clone()].into_iter();
        let staged = stage_with(&lock_path, br#"{"holder":"local"}"#, || {
            Ok(names
                .next()
                .unwrap_or_else(|| generate_temp_path(&lock_path).unwrap()))
        })
        .unwrap();
        assert_ne!(staged.temp_path(), foreign_path.as_path());
        assert!(staged.commit_exclusive().unwrap());

        assert_eq!(fs::read_to_string(&foreign_path).unwrap(), "remote-partial");
        foreign.write_all(b"REMOTE-GARBAGE").unwrap();
        foreign.sync_all().unwrap();

        assert_eq!(
            fs::read_to_string(&lock_path).unwrap(),
            r#"{"holder":"local"}"#
        );
    }

    #[test]
    fn test_staging_gives_up_when_every_name_is_taken() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("session_state.json");
        let taken = temp_dir.path().join(".session_state.json.taken.tmp");
        fs::write(&taken, "someone else").unwrap();

        let err = stage_with(&target, b"{}", || Ok(taken.clone())).unwrap_err();

        assert!(matches!(err, PackError::Io(_)));
        assert_eq!(fs::read_to_string(&taken).unwrap(), "someone else");
        assert!(!target.exists());
    }

    #[test]
    fn test_atomic_create_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("session.lock");

        assert!(atomic_create(&file_path, b"first").unwrap());
        assert!(!atomic_create(&file_path, b"second").unwrap());

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "first");
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_atomic_create_races_have_one_winner() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("session.lock");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = file_path.clone();
                std::thread::spawn(move || atomic_create(&path, format!("writer {}", i).as_bytes()))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.starts_with("writer "));
    }

    #[test]
    fn test_concurrent_replace_never_tears() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("session.lock");
        let payload_a = "a".repeat(64 * 1024);
        let payload_b = "b".repeat(64 * 1024);
        atomic_write_file(&file_path, &payload_a).unwrap();

        let writer = {
            let path = file_path.clone();
            let (a, b) = (payload_a.clone(), payload_b.clone());
            std::thread::spawn(move || {
                for i in 0..50 {
                    let next = if i % 2 == 0 { &b } else { &a };
                    atomic_write_file(&path, next).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let content = fs::read_to_string(&file_path).unwrap();
            assert!(content == payload_a || content == payload_b);
        }
        writer.join().unwrap();
    }
}
