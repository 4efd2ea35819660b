use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Checkpoint {0} already undone")]
    AlreadyUndone(String),

    #[error("Checkpoint {0} already completed")]
    AlreadyCompleted(String),

    #[error("Backups for checkpoint {0} were reclaimed")]
    BackupReclaimed(String),

    #[error("No operations to undo")]
    NothingToUndo,

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Analysis worker exited without a result")]
    WorkerGone,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
