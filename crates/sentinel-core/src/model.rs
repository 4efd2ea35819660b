use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Snapshot of a file's metadata taken at scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    /// Lowercased, with the leading dot. Empty when the name has none.
    pub extension: String,
    pub size_bytes: u64,
    pub modified_time: Option<DateTime<Local>>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, size_bytes: u64, modified_time: Option<DateTime<Local>>) -> Self {
        let path = path.into();
        let as_path = Path::new(&path);
        let name = as_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let extension = as_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        Self {
            path,
            name,
            extension,
            size_bytes,
            modified_time,
        }
    }

    /// Build a record from the filesystem.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let metadata = fs::metadata(path)?;
        let modified = metadata.modified().ok().map(DateTime::<Local>::from);
        Ok(Self::new(
            path.to_string_lossy().into_owned(),
            metadata.len(),
            modified,
        ))
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    /// Whole days since last modification, relative to `now`.
    pub fn age_days(&self, now: DateTime<Local>) -> Option<i64> {
        self.modified_time.map(|m| (now - m).num_days())
    }

    pub fn parent_dir(&self) -> String {
        Path::new(&self.path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub fn total_size_mb(files: &[FileRecord]) -> f64 {
    files.iter().map(FileRecord::size_mb).sum()
}
