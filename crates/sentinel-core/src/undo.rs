//! Checkpoints: file backups taken before a mutating operation, restorable
//! once.
//!
//! Each checkpoint owns `<backup_dir>/<id>/`, under which every backed-up
//! file sits at its absolute path with the root stripped. The history of all
//! checkpoints is a JSON array at `<backup_dir>/history.json`, rewritten on
//! every state change.
//!
//! Restores copy files back over the originals one at a time. A failure
//! midway leaves earlier files restored; there is no rollback of the undo.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::UndoConfig;
use crate::error::{Error, Result};
use crate::events::{EventCategory, EventSink};
use crate::persist;
use crate::platform;

const HISTORY_FILE: &str = "history.json";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Created,
    Completed,
    Undone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub size_mb: f64,
}

/// Outcome of the operation a checkpoint guarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub processed: usize,
    pub failed: usize,
    pub space_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub description: String,
    pub files: Vec<BackupEntry>,
    pub total_size_mb: f64,
    pub checkpoint_dir: PathBuf,
    pub state: CheckpointState,
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub operation_details: Option<OperationSummary>,
    #[serde(default)]
    pub undone_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub restore_count: usize,
    #[serde(default)]
    pub restore_errors: Vec<String>,
    /// Backup directory deleted by retention; the checkpoint can no longer
    /// be undone.
    #[serde(default)]
    pub reclaimed: bool,
}

impl Checkpoint {
    pub fn files_count(&self) -> usize {
        self.files.len()
    }

    pub fn can_undo(&self) -> bool {
        self.state != CheckpointState::Undone && !self.reclaimed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndoReport {
    pub checkpoint_id: String,
    pub files_restored: usize,
    pub errors: Vec<String>,
}

/// Copy a file and carry over its modification time and permissions.
///
/// The data goes to a writable staging file next to `to`, the mtime is set
/// while it is still writable, the source permissions are applied last and
/// the staging file is renamed into place. Read-only sources and read-only
/// targets both work. Nothing is left behind on failure.
pub(crate) fn copy_preserving(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(to);
    match write_staged(from, &staging).and_then(|bytes| {
        fs::rename(&staging, to)?;
        Ok(bytes)
    }) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    warn!("Failed to remove partial copy {}: {}", staging.display(), cleanup);
                }
            }
            Err(e)
        }
    }
}

fn staging_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    to.with_file_name(format!(".{}.sentinel-partial", name))
}

fn write_staged(from: &Path, staging: &Path) -> Result<u64> {
    let metadata = fs::metadata(from)?;
    let mut source = File::open(from)?;
    let mut target = File::create(staging)?;
    let bytes = io::copy(&mut source, &mut target)?;
    target.set_modified(metadata.modified()?)?;
    drop(target);
    fs::set_permissions(staging, metadata.permissions())?;
    Ok(bytes)
}

pub struct CheckpointLog {
    backup_dir: PathBuf,
    history: Vec<Checkpoint>,
    sink: Arc<dyn EventSink>,
}

impl CheckpointLog {
    /// Open the backup directory, creating it if needed. A corrupted history
    /// file is logged and replaced by an empty history.
    pub fn open(config: &UndoConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        fs::create_dir_all(&config.backup_dir)?;
        let history = persist::load_json(&config.backup_dir.join(HISTORY_FILE)).unwrap_or_default();
        Ok(Self {
            backup_dir: config.backup_dir.clone(),
            history,
            sink,
        })
    }

    fn save(&self) -> Result<()> {
        persist::save_json(&self.backup_dir.join(HISTORY_FILE), &self.history)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn get(&self, id: &str) -> Option<&Checkpoint> {
        self.history.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Checkpoint> {
        self.history
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::CheckpointNotFound(id.to_string()))
    }

    fn unique_id(&self, now: DateTime<Local>) -> String {
        let base = format!("checkpoint_{}", now.format("%Y%m%d_%H%M%S_%6f"));
        let taken = |id: &str| self.get(id).is_some() || self.backup_dir.join(id).exists();

        let mut id = base.clone();
        let mut n = 1;
        while taken(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        id
    }

    /// Back up every existing file in `files` and record a new checkpoint.
    ///
    /// Missing files and files that fail to copy are left out of the
    /// checkpoint; failures are reported to the sink.
    pub fn create_checkpoint(&mut self, operation: &str, description: &str, files: &[PathBuf]) -> Result<String> {
        let now = Local::now();
        let id = self.unique_id(now);
        let checkpoint_dir = self.backup_dir.join(&id);
        fs::create_dir_all(&checkpoint_dir)?;

        let mut entries = Vec::new();
        for path in files {
            if !path.exists() {
                debug!("Skipping backup of missing {}", path.display());
                continue;
            }
            let original = match fs::canonicalize(path) {
                Ok(p) => p,
                Err(e) => {
                    self.sink.log_event(
                        EventCategory::Error,
                        &format!("Backup failed for {}: {}", path.display(), e),
                    );
                    continue;
                }
            };
            let backup_path = platform::mirror_path(&checkpoint_dir, &original);
            match copy_preserving(&original, &backup_path) {
                Ok(bytes) => entries.push(BackupEntry {
                    original_path: original,
                    backup_path,
                    size_mb: bytes as f64 / BYTES_PER_MB,
                }),
                Err(e) => self.sink.log_event(
                    EventCategory::Error,
                    &format!("Backup failed for {}: {}", path.display(), e),
                ),
            }
        }

        let total_size_mb: f64 = entries.iter().map(|e| e.size_mb).sum();
        info!("Checkpoint {} backed up {} files ({:.1} MB)", id, entries.len(), total_size_mb);
        self.history.push(Checkpoint {
            id: id.clone(),
            timestamp: now,
            operation: operation.to_string(),
            description: description.to_string(),
            files: entries,
            total_size_mb,
            checkpoint_dir,
            state: CheckpointState::Created,
            completed_at: None,
            operation_details: None,
            undone_at: None,
            restore_count: 0,
            restore_errors: Vec::new(),
            reclaimed: false,
        });
        self.save()?;
        self.sink
            .log_event(EventCategory::Info, &format!("Checkpoint created: {}", id));
        Ok(id)
    }

    /// Attach the outcome of the guarded operation and mark it completed.
    pub fn record_operation(&mut self, id: &str, details: OperationSummary) -> Result<()> {
        let checkpoint = self.get_mut(id)?;
        match checkpoint.state {
            CheckpointState::Created => {}
            CheckpointState::Completed => return Err(Error::AlreadyCompleted(id.to_string())),
            CheckpointState::Undone => return Err(Error::AlreadyUndone(id.to_string())),
        }
        checkpoint.state = CheckpointState::Completed;
        checkpoint.completed_at = Some(Local::now());
        checkpoint.operation_details = Some(details);
        self.save()
    }

    /// Restore every file of a checkpoint. Per-file failures are collected in
    /// the report; the checkpoint is marked undone either way.
    pub fn undo_checkpoint(&mut self, id: &str) -> Result<UndoReport> {
        let checkpoint = self.get_mut(id)?;
        if checkpoint.state == CheckpointState::Undone {
            return Err(Error::AlreadyUndone(id.to_string()));
        }
        if checkpoint.reclaimed {
            return Err(Error::BackupReclaimed(id.to_string()));
        }

        let mut restored = 0;
        let mut errors = Vec::new();
        for entry in &checkpoint.files {
            if !entry.backup_path.exists() {
                errors.push(format!("Backup not found: {}", entry.backup_path.display()));
                continue;
            }
            match copy_preserving(&entry.backup_path, &entry.original_path) {
                Ok(_) => restored += 1,
                Err(e) => {
                    warn!("Failed to restore {}: {}", entry.original_path.display(), e);
                    errors.push(format!("Failed to restore {}: {}", entry.original_path.display(), e));
                }
            }
        }

        checkpoint.state = CheckpointState::Undone;
        checkpoint.undone_at = Some(Local::now());
        checkpoint.restore_count = restored;
        checkpoint.restore_errors = errors.clone();
        self.save()?;

        self.sink.log_event(
            EventCategory::Info,
            &format!("Undone: {} ({} files restored)", id, restored),
        );
        Ok(UndoReport {
            checkpoint_id: id.to_string(),
            files_restored: restored,
            errors,
        })
    }

    /// Undo the newest checkpoint that can still be undone.
    pub fn undo_last(&mut self) -> Result<UndoReport> {
        let id = self
            .history
            .iter()
            .rev()
            .find(|c| c.can_undo())
            .map(|c| c.id.clone())
            .ok_or(Error::NothingToUndo)?;
        self.undo_checkpoint(&id)
    }

    /// Most recent checkpoints first.
    pub fn history(&self, limit: usize) -> Vec<&Checkpoint> {
        self.history.iter().rev().take(limit).collect()
    }

    pub fn undo_candidates(&self) -> Vec<&Checkpoint> {
        self.history.iter().rev().filter(|c| c.can_undo()).collect()
    }

    /// Delete backup directories of checkpoints older than `keep_days`,
    /// whatever their state. Returns how many were reclaimed.
    pub fn cleanup_old_backups(&mut self, keep_days: i64) -> Result<usize> {
        let cutoff = Local::now() - Duration::days(keep_days);
        let mut removed = 0;

        for checkpoint in self.history.iter_mut() {
            if checkpoint.reclaimed || checkpoint.timestamp >= cutoff {
                continue;
            }
            if checkpoint.checkpoint_dir.exists() {
                if let Err(e) = fs::remove_dir_all(&checkpoint.checkpoint_dir) {
                    self.sink.log_event(
                        EventCategory::Error,
                        &format!("Failed to remove backup {}: {}", checkpoint.id, e),
                    );
                    continue;
                }
            }
            checkpoint.reclaimed = true;
            removed += 1;
        }

        if removed > 0 {
            self.save()?;
            self.sink.log_event(
                EventCategory::Info,
                &format!("Cleaned up {} old backups", removed),
            );
        }
        Ok(removed)
    }

    #[cfg(test)]
    fn backdate(&mut self, id: &str, days: i64) {
        if let Ok(checkpoint) = self.get_mut(id) {
            checkpoint.timestamp = checkpoint.timestamp - Duration::days(days);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SilentSink;
    use tempfile::tempdir;

    fn log_in(dir: &Path) -> CheckpointLog {
        let config = UndoConfig {
            backup_dir: dir.join("backups"),
            retention_days: 30,
        };
        CheckpointLog::open(&config, Arc::new(SilentSink)).unwrap()
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        let a = log.create_checkpoint("cleanup", "first", &[]).unwrap();
        let b = log.create_checkpoint("cleanup", "second", &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        let present = dir.path().join("present.txt");
        fs::write(&present, b"x").unwrap();
        let id = log
            .create_checkpoint("cleanup", "mixed", &[present, dir.path().join("gone.txt")])
            .unwrap();
        assert_eq!(log.get(&id).unwrap().files_count(), 1);
    }

    #[test]
    fn test_read_only_file_is_backed_up_intact() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("locked.txt");
        fs::write(&source, b"keep me").unwrap();
        let mut perms = fs::metadata(&source).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&source, perms).unwrap();

        let target = dir.path().join("copies").join("locked.txt");
        assert_eq!(copy_preserving(&source, &target).unwrap(), 7);

        let original = fs::metadata(&source).unwrap();
        let copy = fs::metadata(&target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
        assert_eq!(copy.modified().unwrap(), original.modified().unwrap());
        assert!(copy.permissions().readonly());
        assert!(!staging_path(&target).exists());

        // Restoring over a read-only file replaces it.
        fs::write(&target.with_file_name("newer.txt"), b"newer").unwrap();
        copy_preserving(&target.with_file_name("newer.txt"), &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"newer");
    }

    #[test]
    fn test_failed_copy_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.txt");
        assert!(copy_preserving(&dir.path().join("missing.txt"), &target).is_err());
        assert!(!target.exists());
        assert!(!staging_path(&target).exists());
    }

    #[test]
    fn test_record_operation_only_once() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        let id = log.create_checkpoint("organize", "x", &[]).unwrap();
        log.record_operation(&id, OperationSummary::default()).unwrap();
        assert_eq!(log.get(&id).unwrap().state, CheckpointState::Completed);
        assert!(matches!(
            log.record_operation(&id, OperationSummary::default()),
            Err(Error::AlreadyCompleted(_))
        ));
    }

    #[test]
    fn test_unknown_checkpoint() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        assert!(matches!(log.undo_checkpoint("nope"), Err(Error::CheckpointNotFound(_))));
        assert!(matches!(log.undo_last(), Err(Error::NothingToUndo)));
    }

    #[test]
    fn test_reclaimed_checkpoint_cannot_be_undone() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        let file = dir.path().join("a.txt");
        fs::write(&file, b"a").unwrap();
        let id = log.create_checkpoint("cleanup", "x", &[file]).unwrap();
        log.backdate(&id, 40);

        assert_eq!(log.cleanup_old_backups(30).unwrap(), 1);
        assert!(!log.get(&id).unwrap().checkpoint_dir.exists());
        assert!(matches!(log.undo_checkpoint(&id), Err(Error::BackupReclaimed(_))));
        assert!(log.undo_candidates().is_empty());
        assert_eq!(log.cleanup_old_backups(30).unwrap(), 0);
    }

    #[test]
    fn test_history_newest_first() {
        let dir = tempdir().unwrap();
        let mut log = log_in(dir.path());
        let first = log.create_checkpoint("a", "1", &[]).unwrap();
        let second = log.create_checkpoint("b", "2", &[]).unwrap();
        let ids: Vec<&str> = log.history(10).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);
        assert_eq!(log.history(1).len(), 1);
    }
}
