use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

use sentinel_core::config::UndoConfig;
use sentinel_core::undo::{CheckpointState, OperationSummary};
use sentinel_core::{CheckpointLog, Error, SilentSink};

fn open_log(root: &Path) -> CheckpointLog {
    let config = UndoConfig {
        backup_dir: root.join(".sentinel_backups"),
        retention_days: 30,
    };
    CheckpointLog::open(&config, Arc::new(SilentSink)).unwrap()
}

/// Layout:
///   data/
///     report.pdf   (binary bytes)
///     notes/todo.txt
fn create_files(root: &Path) -> Vec<PathBuf> {
    let data = root.join("data");
    fs::create_dir_all(data.join("notes")).unwrap();
    let report = data.join("report.pdf");
    let todo = data.join("notes/todo.txt");
    fs::write(&report, (0u8..=255).cycle().take(10_000).collect::<Vec<u8>>()).unwrap();
    fs::write(&todo, "buy milk\n").unwrap();
    vec![report, todo]
}

#[test]
fn test_checkpoint_round_trip_is_byte_identical() {
    let tmp = tempdir().unwrap();
    let files = create_files(tmp.path());
    let originals: Vec<Vec<u8>> = files.iter().map(|f| fs::read(f).unwrap()).collect();
    let mtimes: Vec<_> = files
        .iter()
        .map(|f| fs::metadata(f).unwrap().modified().unwrap())
        .collect();

    let mut log = open_log(tmp.path());
    let id = log.create_checkpoint("cleanup", "remove everything", &files).unwrap();
    assert_eq!(log.get(&id).unwrap().files_count(), 2);

    // Destroy the originals, including the directory of one of them
    fs::remove_file(&files[0]).unwrap();
    fs::remove_dir_all(tmp.path().join("data/notes")).unwrap();
    log.record_operation(&id, OperationSummary { processed: 2, ..Default::default() })
        .unwrap();

    let report = log.undo_checkpoint(&id).unwrap();
    assert_eq!(report.files_restored, 2);
    assert!(report.errors.is_empty());

    for (i, file) in files.iter().enumerate() {
        assert_eq!(fs::read(file).unwrap(), originals[i]);
        assert_eq!(fs::metadata(file).unwrap().modified().unwrap(), mtimes[i]);
    }
}

#[test]
fn test_undo_is_single_shot() {
    let tmp = tempdir().unwrap();
    let files = create_files(tmp.path());
    let mut log = open_log(tmp.path());
    let id = log.create_checkpoint("organize", "move things", &files).unwrap();

    log.undo_checkpoint(&id).unwrap();
    assert_eq!(log.get(&id).unwrap().state, CheckpointState::Undone);

    // A second undo must not write anything
    fs::write(&files[1], "changed after undo").unwrap();
    let err = log.undo_checkpoint(&id).unwrap_err();
    assert!(matches!(err, Error::AlreadyUndone(_)));
    assert_eq!(fs::read_to_string(&files[1]).unwrap(), "changed after undo");
}

#[test]
fn test_undo_last_picks_newest_undoable() {
    let tmp = tempdir().unwrap();
    let files = create_files(tmp.path());
    let mut log = open_log(tmp.path());

    let first = log.create_checkpoint("cleanup", "first", &files[..1]).unwrap();
    let second = log.create_checkpoint("cleanup", "second", &files[1..]).unwrap();

    assert_eq!(log.undo_last().unwrap().checkpoint_id, second);
    assert_eq!(log.undo_last().unwrap().checkpoint_id, first);
    assert!(matches!(log.undo_last(), Err(Error::NothingToUndo)));
}

#[test]
fn test_history_persists_across_reopen() {
    let tmp = tempdir().unwrap();
    let files = create_files(tmp.path());
    let id = {
        let mut log = open_log(tmp.path());
        log.create_checkpoint("archive", "persisted", &files).unwrap()
    };

    let log = open_log(tmp.path());
    let checkpoint = log.get(&id).unwrap();
    assert_eq!(checkpoint.description, "persisted");
    assert_eq!(checkpoint.state, CheckpointState::Created);
    assert_eq!(log.undo_candidates().len(), 1);
}

#[test]
fn test_corrupted_history_starts_empty() {
    let tmp = tempdir().unwrap();
    let backup_dir = tmp.path().join(".sentinel_backups");
    fs::create_dir_all(&backup_dir).unwrap();
    fs::write(backup_dir.join("history.json"), "[{ broken").unwrap();

    let mut log = open_log(tmp.path());
    assert!(log.history(20).is_empty());
    log.create_checkpoint("cleanup", "fresh start", &[]).unwrap();
    assert_eq!(log.history(20).len(), 1);
}

#[test]
fn test_missing_backup_reported_on_undo() {
    let tmp = tempdir().unwrap();
    let files = create_files(tmp.path());
    let mut log = open_log(tmp.path());
    let id = log.create_checkpoint("cleanup", "partial", &files).unwrap();

    let backup = log.get(&id).unwrap().files[0].backup_path.clone();
    fs::remove_file(&backup).unwrap();

    let report = log.undo_checkpoint(&id).unwrap();
    assert_eq!(report.files_restored, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Backup not found"));
    assert_eq!(log.get(&id).unwrap().restore_errors, report.errors);
}
