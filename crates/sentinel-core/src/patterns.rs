//! Batch-level pattern detection over file names and timestamps.
//!
//! Every detector is a pure function of its input slice: no I/O, no
//! mutation. Groups are reported in first-seen order unless stated otherwise.

use chrono::{DateTime, Local, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::classifier::Category;
use crate::model::{total_size_mb, FileRecord};

const PHOTO_BATCH_MIN: usize = 5;
const TEMPORAL_GROUP_MIN: usize = 10;
const SERIES_MIN_EXCLUSIVE: usize = 3;
const NAMING_CHAOS_MAX_EXCLUSIVE: usize = 5;
const PROJECT_MIN_CODE_FILES: usize = 3;

lazy_static! {
    static ref DUPLICATE_NOISE: Regex = Regex::new(r"\s-\scopy|_copy|[\s_]*\(\d+\)|\d+").unwrap();
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
    static ref CAMEL_TRANSITION: Regex = Regex::new(r"[a-z][A-Z]").unwrap();
    static ref BACKUP_SUFFIX: Regex =
        Regex::new(r"(?i)(?:[\s_-]+(?:copy|backup|old|bak)|\s*\(\d+\))$").unwrap();
}

/// Group items by key, keeping groups in the order their key first appeared.
fn group_in_order<'a, K, F>(files: &'a [FileRecord], key: F) -> Vec<(K, Vec<&'a FileRecord>)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&FileRecord) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&FileRecord>)> = Vec::new();
    for file in files {
        let Some(k) = key(file) else { continue };
        match index.get(&k) {
            Some(&i) => groups[i].1.push(file),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![file]));
            }
        }
    }
    groups
}

fn paths(files: &[&FileRecord]) -> Vec<String> {
    files.iter().map(|f| f.path.clone()).collect()
}

// ── Duplicate clusters ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCluster {
    pub normalized_name: String,
    pub files: Vec<String>,
}

impl DuplicateCluster {
    pub fn count(&self) -> usize {
        self.files.len()
    }
}

/// Lowercase and strip digits and copy markers until nothing changes, so
/// normalizing twice gives the same result as normalizing once.
pub fn normalize_duplicate_name(name: &str) -> String {
    let mut current = name.to_lowercase();
    loop {
        let next = DUPLICATE_NOISE.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

pub fn find_duplicate_clusters(files: &[FileRecord]) -> Vec<DuplicateCluster> {
    group_in_order(files, |f| Some(normalize_duplicate_name(&f.name)))
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(normalized_name, group)| DuplicateCluster {
            normalized_name,
            files: paths(&group),
        })
        .collect()
}

// ── Naming conventions ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NamingStats {
    pub camel_case: usize,
    pub snake_case: usize,
    pub kebab_case: usize,
}

impl NamingStats {
    /// Mixed conventions at meaningful volume, not just a one-off.
    pub fn is_chaotic(&self) -> bool {
        let counts = [self.camel_case, self.snake_case, self.kebab_case];
        let min = counts.iter().copied().min().unwrap_or(0);
        let max = counts.iter().copied().max().unwrap_or(0);
        min > 0 && max > NAMING_CHAOS_MAX_EXCLUSIVE
    }
}

pub fn naming_stats(files: &[FileRecord]) -> NamingStats {
    NamingStats {
        camel_case: files.iter().filter(|f| CAMEL_TRANSITION.is_match(&f.name)).count(),
        snake_case: files.iter().filter(|f| f.name.contains('_')).count(),
        kebab_case: files.iter().filter(|f| f.name.contains('-')).count(),
    }
}

// ── Numbered series ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSeries {
    pub pattern: String,
    pub files: Vec<String>,
    pub is_sequential: bool,
    pub range: Option<(u64, u64)>,
}

impl FileSeries {
    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn range_label(&self) -> String {
        match self.range {
            Some((lo, hi)) => format!("{}-{}", lo, hi),
            None => "unknown".to_string(),
        }
    }
}

pub fn detect_series(files: &[FileRecord]) -> Vec<FileSeries> {
    group_in_order(files, |f| Some(DIGIT_RUN.replace_all(&f.name, "#").into_owned()))
        .into_iter()
        .filter(|(pattern, group)| group.len() > SERIES_MIN_EXCLUSIVE && pattern.contains('#'))
        .map(|(pattern, group)| {
            let mut numbers: Vec<u64> = group
                .iter()
                .filter_map(|f| DIGIT_RUN.find(&f.name))
                .filter_map(|m| m.as_str().parse().ok())
                .collect();
            numbers.sort_unstable();

            let is_sequential = numbers.windows(2).all(|w| w[0].checked_add(1) == Some(w[1]));
            let range = match (numbers.first(), numbers.last()) {
                (Some(&lo), Some(&hi)) => Some((lo, hi)),
                _ => None,
            };

            FileSeries {
                pattern,
                files: paths(&group),
                is_sequential,
                range,
            }
        })
        .collect()
}

// ── Backup / original pairs ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupPair {
    pub base_name: String,
    pub original: FileRecord,
    pub backups: Vec<FileRecord>,
}

impl BackupPair {
    pub fn count(&self) -> usize {
        self.backups.len() + 1
    }
}

/// Base name with backup markers removed.
///
/// The suffix is stripped from the stem so `report copy.docx` and
/// `report.docx` share a base. A trailing `.bak`/`.old` extension is treated
/// the same way: `notes.txt.bak` pairs with `notes.txt`.
pub fn backup_base_name(name: &str) -> String {
    let path = Path::new(name);
    let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    if let Some(ext) = extension.as_deref() {
        if ext == "bak" || ext == "old" {
            if let Some(stem) = path.file_stem() {
                return backup_base_name(&stem.to_string_lossy());
            }
        }
    }

    let (stem, suffix) = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => (stem.to_string_lossy().into_owned(), format!(".{}", ext.to_string_lossy())),
        _ => (name.to_string(), String::new()),
    };
    let stripped = BACKUP_SUFFIX.replace(&stem, "");
    if stripped.is_empty() {
        return format!("{}{}", stem, suffix);
    }
    format!("{}{}", stripped, suffix)
}

pub fn detect_backup_pairs(files: &[FileRecord]) -> Vec<BackupPair> {
    group_in_order(files, |f| Some(backup_base_name(&f.name)))
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(base_name, group)| {
            let mut sorted: Vec<FileRecord> = group.into_iter().cloned().collect();
            // Newest first; unknown timestamps sort last.
            sorted.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
            let original = sorted.remove(0);
            BackupPair {
                base_name,
                original,
                backups: sorted,
            }
        })
        .collect()
}

// ── Temporal grouping ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoBatch {
    pub hour: DateTime<Local>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalGroup {
    /// `YYYY-MM`
    pub period: String,
    pub files: Vec<String>,
    pub total_size_mb: f64,
}

fn truncate_to_hour(t: DateTime<Local>) -> Option<DateTime<Local>> {
    t.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

pub fn detect_photo_batches(files: &[FileRecord]) -> Vec<PhotoBatch> {
    let images: Vec<FileRecord> = files
        .iter()
        .filter(|f| Category::Images.matches_extension(&f.extension))
        .cloned()
        .collect();

    let mut batches: Vec<PhotoBatch> = group_in_order(&images, |f| f.modified_time.and_then(truncate_to_hour))
        .into_iter()
        .filter(|(_, group)| group.len() >= PHOTO_BATCH_MIN)
        .map(|(hour, group)| PhotoBatch {
            hour,
            files: paths(&group),
        })
        .collect();
    batches.sort_by_key(|b| b.hour);
    batches
}

pub fn detect_temporal_groups(files: &[FileRecord]) -> Vec<TemporalGroup> {
    let mut groups: Vec<TemporalGroup> =
        group_in_order(files, |f| f.modified_time.map(|t| t.format("%Y-%m").to_string()))
            .into_iter()
            .filter(|(_, group)| group.len() >= TEMPORAL_GROUP_MIN)
            .map(|(period, group)| {
                let owned: Vec<FileRecord> = group.iter().map(|f| (*f).clone()).collect();
                TemporalGroup {
                    period,
                    files: paths(&group),
                    total_size_mb: total_size_mb(&owned),
                }
            })
            .collect();
    groups.sort_by(|a, b| b.period.cmp(&a.period));
    groups
}

// ── Size / age ──────────────────────────────────────────────────

pub fn large_files(files: &[FileRecord], threshold_mb: f64) -> Vec<FileRecord> {
    files.iter().filter(|f| f.size_mb() > threshold_mb).cloned().collect()
}

pub fn old_files(files: &[FileRecord], now: DateTime<Local>, older_than_days: i64) -> Vec<FileRecord> {
    files
        .iter()
        .filter(|f| f.age_days(now).is_some_and(|age| age > older_than_days))
        .cloned()
        .collect()
}

// ── Project folders ─────────────────────────────────────────────

const PROJECT_CODE_EXTENSIONS: [&str; 8] = [".py", ".js", ".java", ".cpp", ".c", ".go", ".rs", ".ts"];
const PROJECT_CONFIG_EXTENSIONS: [&str; 5] = [".json", ".yaml", ".toml", ".ini", ".xml"];
const PROJECT_DOC_EXTENSIONS: [&str; 3] = [".md", ".txt", ".rst"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectIndicators {
    pub code_files: usize,
    pub config_files: usize,
    pub docs: usize,
    pub has_readme: bool,
    pub has_gitignore: bool,
    pub has_package_json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFolder {
    pub path: String,
    pub confidence: u8,
    pub file_count: usize,
    pub indicators: ProjectIndicators,
}

pub fn detect_project_folders(files: &[FileRecord]) -> Vec<ProjectFolder> {
    group_in_order(files, |f| Some(f.parent_dir()))
        .into_iter()
        .filter_map(|(dir, group)| {
            let mut ind = ProjectIndicators::default();
            for file in &group {
                let ext = file.extension.as_str();
                let name = file.name.to_lowercase();
                if PROJECT_CODE_EXTENSIONS.contains(&ext) {
                    ind.code_files += 1;
                }
                if PROJECT_CONFIG_EXTENSIONS.contains(&ext) {
                    ind.config_files += 1;
                }
                if PROJECT_DOC_EXTENSIONS.contains(&ext) {
                    ind.docs += 1;
                }
                ind.has_readme |= name.contains("readme");
                ind.has_gitignore |= name.contains("gitignore");
                ind.has_package_json |= name.contains("package.json");
            }

            if ind.code_files < PROJECT_MIN_CODE_FILES {
                return None;
            }
            let mut confidence = (50 + ind.code_files * 5).min(95);
            if ind.has_readme {
                confidence += 10;
            }
            if ind.has_gitignore {
                confidence += 10;
            }

            Some(ProjectFolder {
                path: dir,
                confidence: confidence.min(100) as u8,
                file_count: group.len(),
                indicators: ind,
            })
        })
        .collect()
}

// ── Aggregate ───────────────────────────────────────────────────

/// Thresholds for the size/age detectors.
#[derive(Debug, Clone, Copy)]
pub struct DetectorThresholds {
    pub large_file_mb: f64,
    pub old_file_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    pub duplicates: Vec<DuplicateCluster>,
    pub naming: NamingStats,
    pub series: Vec<FileSeries>,
    pub backup_pairs: Vec<BackupPair>,
    pub photo_batches: Vec<PhotoBatch>,
    pub temporal_groups: Vec<TemporalGroup>,
    pub large_files: Vec<FileRecord>,
    pub old_files: Vec<FileRecord>,
    pub projects: Vec<ProjectFolder>,
}

pub fn detect_all(files: &[FileRecord], now: DateTime<Local>, thresholds: DetectorThresholds) -> PatternReport {
    PatternReport {
        duplicates: find_duplicate_clusters(files),
        naming: naming_stats(files),
        series: detect_series(files),
        backup_pairs: detect_backup_pairs(files),
        photo_batches: detect_photo_batches(files),
        temporal_groups: detect_temporal_groups(files),
        large_files: large_files(files, thresholds.large_file_mb),
        old_files: old_files(files, now, thresholds.old_file_days),
        projects: detect_project_folders(files),
    }
}
