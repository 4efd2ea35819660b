//! Mutating batch operations.
//!
//! Every operation first builds a plan. A dry run returns the plan as-is.
//! A real run snapshots the affected files into a checkpoint, applies the
//! plan file by file (collecting failures instead of aborting), completes
//! the checkpoint, records the outcome with the learning store and reports
//! to the event sink.

use chrono::{Duration, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::{classify, Category};
use crate::config::CleanupConfig;
use crate::error::{Error, Result};
use crate::events::{EventCategory, EventSink, SilentSink};
use crate::learning::{ActionDetails, LearningStore};
use crate::model::FileRecord;
use crate::recommend::ActionKind;
use crate::scanner;
use crate::undo::{copy_preserving, CheckpointLog, OperationSummary};

const OTHER_FOLDER: &str = "Other";
const ORGANIZE_STYLE: &str = "by_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
    Old,
    Temp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupCandidate {
    pub path: PathBuf,
    pub size_mb: f64,
    pub age_days: Option<i64>,
    pub reason: CleanupReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub candidates: Vec<CleanupCandidate>,
    pub files_removed: usize,
    pub space_freed_mb: f64,
    pub checkpoint_id: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub to: PathBuf,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArchiveReport {
    pub dry_run: bool,
    pub moves: Vec<PlannedMove>,
    pub files_archived: usize,
    pub total_size_mb: f64,
    pub checkpoint_id: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrganizeReport {
    pub dry_run: bool,
    pub moves: Vec<PlannedMove>,
    pub files_organized: usize,
    pub folders_created: Vec<String>,
    pub checkpoint_id: Option<String>,
    pub errors: Vec<String>,
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_preserving(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

/// `dir/name`, or `dir/stem_N.ext` for the first N that is free on disk and
/// not already claimed by this plan.
fn unique_destination(dir: &Path, file_name: &str, claimed: &HashSet<PathBuf>) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() && !claimed.contains(&candidate) {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() && !claimed.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_backed_up(path: &Path, backed_up: &HashSet<PathBuf>) -> bool {
    fs::canonicalize(path).map_or(false, |p| backed_up.contains(&p))
}

fn not_backed_up(path: &Path) -> String {
    format!("Not backed up, skipped: {}", path.display())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct Operations<'a> {
    cleanup: &'a CleanupConfig,
    checkpoints: &'a mut CheckpointLog,
    learning: &'a mut LearningStore,
    sink: Arc<dyn EventSink>,
}

impl<'a> Operations<'a> {
    pub fn new(
        cleanup: &'a CleanupConfig,
        checkpoints: &'a mut CheckpointLog,
        learning: &'a mut LearningStore,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cleanup,
            checkpoints,
            learning,
            sink,
        }
    }

    /// Canonical paths that made it into the checkpoint's backups.
    fn backed_up(&self, checkpoint_id: &str) -> HashSet<PathBuf> {
        self.checkpoints
            .get(checkpoint_id)
            .map(|c| c.files.iter().map(|e| e.original_path.clone()).collect())
            .unwrap_or_default()
    }

    fn is_temp(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.cleanup
            .temp_extensions
            .iter()
            .any(|ext| lowered.ends_with(&ext.to_lowercase()))
    }

    /// Remove files under `folder` (recursively) that are older than
    /// `age_days` or carry a temp extension. The backup directory is never
    /// touched.
    pub fn cleanup_temp_files(&mut self, folder: &Path, age_days: i64, dry_run: bool) -> Result<CleanupReport> {
        if !folder.is_dir() {
            return Err(Error::NotFound(folder.to_path_buf()));
        }
        let folder = fs::canonicalize(folder)?;
        let backup_root = fs::canonicalize(self.checkpoints.backup_dir()).ok();
        let now = Local::now();
        let cutoff = now - Duration::days(age_days);

        let files = scanner::scan(&[folder.to_string_lossy().into_owned()], &[], &SilentSink)?;
        let candidates: Vec<CleanupCandidate> = files
            .iter()
            .filter(|f| match &backup_root {
                Some(root) => !Path::new(&f.path).starts_with(root),
                None => true,
            })
            .filter_map(|f| {
                let is_old = f.modified_time.map_or(false, |m| m < cutoff);
                let is_temp = self.is_temp(&f.name);
                if !is_old && !is_temp {
                    return None;
                }
                Some(CleanupCandidate {
                    path: PathBuf::from(&f.path),
                    size_mb: f.size_mb(),
                    age_days: f.age_days(now),
                    reason: if is_old { CleanupReason::Old } else { CleanupReason::Temp },
                })
            })
            .collect();

        let mut report = CleanupReport {
            dry_run,
            candidates,
            ..Default::default()
        };
        if dry_run || report.candidates.is_empty() {
            return Ok(report);
        }

        let paths: Vec<PathBuf> = report.candidates.iter().map(|c| c.path.clone()).collect();
        let checkpoint_id = self.checkpoints.create_checkpoint(
            "cleanup",
            &format!("Cleanup of {} files in {}", paths.len(), folder.display()),
            &paths,
        )?;

        let backed_up = self.backed_up(&checkpoint_id);
        for candidate in &report.candidates {
            if !is_backed_up(&candidate.path, &backed_up) {
                warn!("Not removing {}: no backup", candidate.path.display());
                report.errors.push(not_backed_up(&candidate.path));
                continue;
            }
            match fs::remove_file(&candidate.path) {
                Ok(()) => {
                    report.files_removed += 1;
                    report.space_freed_mb += candidate.size_mb;
                    debug!("Removed {}", candidate.path.display());
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", candidate.path.display(), e);
                    report
                        .errors
                        .push(format!("{}: {}", candidate.path.display(), e));
                }
            }
        }

        self.checkpoints.record_operation(
            &checkpoint_id,
            OperationSummary {
                processed: report.files_removed,
                failed: report.errors.len(),
                space_mb: report.space_freed_mb,
                destination: None,
            },
        )?;
        self.learning.record_action(
            ActionKind::Cleanup,
            ActionDetails {
                files_count: Some(report.files_removed as u64),
                space_freed_mb: Some(report.space_freed_mb),
                age_days: Some(age_days),
                ..Default::default()
            },
            true,
        )?;
        if report.files_removed > 0 {
            self.sink.log_event(
                EventCategory::Cleanup,
                &format!(
                    "Cleanup complete: {} files, {:.2} MB freed",
                    report.files_removed, report.space_freed_mb
                ),
            );
        }

        info!(
            "Cleanup of {}: {} removed, {} failed",
            folder.display(),
            report.files_removed,
            report.errors.len()
        );
        report.checkpoint_id = Some(checkpoint_id);
        Ok(report)
    }

    /// Move files into `archive_folder`, renaming on collision.
    pub fn archive_files(&mut self, paths: &[PathBuf], archive_folder: &Path, dry_run: bool) -> Result<ArchiveReport> {
        let mut report = ArchiveReport {
            dry_run,
            ..Default::default()
        };

        let mut claimed = HashSet::new();
        for path in paths {
            let record = match FileRecord::from_path(path) {
                Ok(r) => r,
                Err(Error::NotFound(_)) => {
                    report.errors.push(format!("File not found: {}", path.display()));
                    continue;
                }
                Err(e) => {
                    report.errors.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            let to = unique_destination(archive_folder, &file_name_of(path), &claimed);
            claimed.insert(to.clone());
            report.total_size_mb += record.size_mb();
            report.moves.push(PlannedMove {
                from: path.clone(),
                to,
                size_mb: record.size_mb(),
            });
        }

        if dry_run || report.moves.is_empty() {
            return Ok(report);
        }

        fs::create_dir_all(archive_folder)?;
        let sources: Vec<PathBuf> = report.moves.iter().map(|m| m.from.clone()).collect();
        let checkpoint_id = self.checkpoints.create_checkpoint(
            "archive",
            &format!("Archive of {} files to {}", sources.len(), archive_folder.display()),
            &sources,
        )?;

        let backed_up = self.backed_up(&checkpoint_id);
        for planned in &report.moves {
            if !is_backed_up(&planned.from, &backed_up) {
                warn!("Not archiving {}: no backup", planned.from.display());
                report.errors.push(not_backed_up(&planned.from));
                continue;
            }
            match move_file(&planned.from, &planned.to) {
                Ok(()) => report.files_archived += 1,
                Err(e) => {
                    warn!("Failed to archive {}: {}", planned.from.display(), e);
                    report.errors.push(format!("{}: {}", planned.from.display(), e));
                }
            }
        }

        let destination = archive_folder.to_string_lossy().into_owned();
        self.checkpoints.record_operation(
            &checkpoint_id,
            OperationSummary {
                processed: report.files_archived,
                failed: report.moves.len() - report.files_archived,
                space_mb: report.total_size_mb,
                destination: Some(destination.clone()),
            },
        )?;
        self.learning.record_action(
            ActionKind::Archive,
            ActionDetails {
                files_count: Some(report.files_archived as u64),
                folder: Some(destination),
                ..Default::default()
            },
            true,
        )?;
        if report.files_archived > 0 {
            self.sink.log_event(
                EventCategory::Organize,
                &format!("Files archived: {}", report.files_archived),
            );
        }

        report.checkpoint_id = Some(checkpoint_id);
        Ok(report)
    }

    /// Move the top-level files of `folder` into one subfolder per category.
    pub fn organize_by_type(&mut self, folder: &Path, dry_run: bool) -> Result<OrganizeReport> {
        if !folder.is_dir() {
            return Err(Error::NotFound(folder.to_path_buf()));
        }

        let mut report = OrganizeReport {
            dry_run,
            ..Default::default()
        };

        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(folder)? {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                    if is_file {
                        entries.push(entry.path());
                    }
                }
                Err(e) => report.errors.push(e.to_string()),
            }
        }
        entries.sort();

        let mut claimed = HashSet::new();
        for path in entries {
            let record = match FileRecord::from_path(&path) {
                Ok(r) => r,
                Err(e) => {
                    report.errors.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            let category = classify(&record).category;
            let folder_name = match category {
                Category::Uncategorized => OTHER_FOLDER.to_string(),
                c => c.title(),
            };
            let target_dir = folder.join(&folder_name);
            if !target_dir.exists() && !report.folders_created.contains(&folder_name) {
                report.folders_created.push(folder_name);
            }

            let to = unique_destination(&target_dir, &record.name, &claimed);
            claimed.insert(to.clone());
            report.moves.push(PlannedMove {
                from: path,
                to,
                size_mb: record.size_mb(),
            });
        }

        if dry_run || report.moves.is_empty() {
            return Ok(report);
        }

        let sources: Vec<PathBuf> = report.moves.iter().map(|m| m.from.clone()).collect();
        let checkpoint_id = self.checkpoints.create_checkpoint(
            "organize",
            &format!("Organize {} files in {} by type", sources.len(), folder.display()),
            &sources,
        )?;

        let backed_up = self.backed_up(&checkpoint_id);
        for planned in &report.moves {
            if !is_backed_up(&planned.from, &backed_up) {
                warn!("Not organizing {}: no backup", planned.from.display());
                report.errors.push(not_backed_up(&planned.from));
                continue;
            }
            let result = planned
                .to
                .parent()
                .map_or(Ok(()), |dir| fs::create_dir_all(dir).map_err(Error::from))
                .and_then(|_| move_file(&planned.from, &planned.to));
            match result {
                Ok(()) => report.files_organized += 1,
                Err(e) => {
                    warn!("Failed to organize {}: {}", planned.from.display(), e);
                    report.errors.push(format!("{}: {}", planned.from.display(), e));
                }
            }
        }

        let folder_str = folder.to_string_lossy().into_owned();
        self.checkpoints.record_operation(
            &checkpoint_id,
            OperationSummary {
                processed: report.files_organized,
                failed: report.moves.len() - report.files_organized,
                space_mb: report.moves.iter().map(|m| m.size_mb).sum(),
                destination: Some(folder_str.clone()),
            },
        )?;
        self.learning.record_action(
            ActionKind::Organize,
            ActionDetails {
                files_count: Some(report.files_organized as u64),
                style: Some(ORGANIZE_STYLE.to_string()),
                folder: Some(folder_str),
                ..Default::default()
            },
            true,
        )?;
        if report.files_organized > 0 {
            self.sink.log_event(
                EventCategory::Organize,
                &format!(
                    "Organized {} files into {} folders",
                    report.files_organized,
                    report.folders_created.len()
                ),
            );
        }

        report.checkpoint_id = Some(checkpoint_id);
        Ok(report)
    }
}
