use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::config::non_overlapping_directories;
use crate::error::Result;
use crate::events::EventSink;
use crate::model::FileRecord;

const PROGRESS_EVERY: usize = 500;

struct Walk<'a> {
    ignore_patterns: Vec<Pattern>,
    found: AtomicUsize,
    sink: &'a dyn EventSink,
}

/// Parallel directory traversal producing a `FileRecord` per regular file.
///
/// Nested roots are collapsed, paths matching any ignore glob are skipped
/// (directories prune their subtree), symlinks are not followed. Directories
/// we may not read are logged and skipped. Output is sorted by path.
pub fn scan(roots: &[String], ignore_globs: &[String], sink: &dyn EventSink) -> Result<Vec<FileRecord>> {
    let ignore_patterns = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let walk = Walk {
        ignore_patterns,
        found: AtomicUsize::new(0),
        sink,
    };

    let roots = non_overlapping_directories(roots);
    debug!("Scanning roots: {:?}", roots);
    sink.on_scan_start();
    let start = Instant::now();

    let nested: Vec<Vec<FileRecord>> = roots
        .par_iter()
        .map(|root| {
            let root = Path::new(root);
            if !root.is_dir() {
                warn!("Scan root {} is not a directory, skipping", root.display());
                return Ok(Vec::new());
            }
            walk.visit_dir(root)
        })
        .collect::<io::Result<_>>()?;

    let mut files: Vec<FileRecord> = nested.into_iter().flatten().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    sink.on_scan_complete(files.len(), start.elapsed().as_secs_f64());
    Ok(files)
}

/// Same as [`scan`] but keeps at most `limit` records.
pub fn scan_limited(
    roots: &[String],
    ignore_globs: &[String],
    limit: usize,
    sink: &dyn EventSink,
) -> Result<Vec<FileRecord>> {
    let mut files = scan(roots, ignore_globs, sink)?;
    files.truncate(limit);
    Ok(files)
}

impl Walk<'_> {
    fn ignored(&self, path: &Path) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches_path(path))
    }

    fn visit_dir(&self, dir: &Path) -> io::Result<Vec<FileRecord>> {
        if self.ignored(dir) {
            return Ok(Vec::new());
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                error!("Access denied reading directory {}: {}", dir.display(), err);
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        };

        let nested: Vec<Vec<FileRecord>> = entries
            .par_bridge()
            .map(|entry_result| {
                let entry = entry_result.map_err(|err| {
                    io::Error::new(
                        err.kind(),
                        format!("Error reading entry in directory {}: {}", dir.display(), err),
                    )
                })?;

                let path = entry.path();
                // symlink_metadata so links are never followed
                let metadata = match fs::symlink_metadata(&path) {
                    Ok(m) => m,
                    Err(err) => {
                        warn!("Error getting metadata for {}: {}", path.display(), err);
                        return Ok(Vec::new());
                    }
                };

                if metadata.is_dir() {
                    return self.visit_dir(&path);
                }
                if !metadata.is_file() || self.ignored(&path) {
                    return Ok(Vec::new());
                }

                let found = self.found.fetch_add(1, Ordering::Relaxed) + 1;
                if found % PROGRESS_EVERY == 0 {
                    self.sink.on_scan_progress(found);
                }
                let modified = metadata.modified().ok().map(Into::into);
                Ok(vec![FileRecord::new(
                    path.to_string_lossy().into_owned(),
                    metadata.len(),
                    modified,
                )])
            })
            .collect::<io::Result<_>>()?;

        Ok(nested.into_iter().flatten().collect())
    }
}
