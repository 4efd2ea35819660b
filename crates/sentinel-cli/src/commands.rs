use clap::{Parser, Subcommand, ValueEnum};
use sentinel_core::ActionKind;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sentinel")]
#[command(about = "Classify files, suggest cleanups and undo them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the configured roots (or the given paths) and print recommendations
    Analyze {
        /// Paths to scan instead of the configured root paths
        paths: Vec<String>,
        /// Skip learned personalization
        #[arg(long)]
        no_learning: bool,
    },
    /// Show duplicate, series, backup and project patterns for a folder
    Relationships { path: String },
    /// Manage custom rules
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Remove old and temporary files from a folder
    Cleanup {
        folder: PathBuf,
        /// Age threshold in days, defaults to the learned cleanup age
        #[arg(long)]
        age_days: Option<i64>,
        #[arg(long)]
        dry_run: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Move files into an archive folder
    Archive {
        #[arg(long)]
        to: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Sort the files of a folder into one subfolder per category
    Organize {
        folder: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Undo a checkpoint, or the most recent one
    Undo { checkpoint_id: Option<String> },
    /// List recent checkpoints
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete backups older than the retention period
    PruneBackups {
        /// Overrides the configured retention days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Record whether a suggested action was accepted
    Feedback {
        kind: KindArg,
        #[arg(long)]
        rejected: bool,
    },
    /// Print what has been learned so far
    Learning,
    /// Predict cleanup targets and space problems
    Predict {
        path: String,
        /// Disk snapshot as MOUNT:PERCENT_USED:FREE_GB, repeatable
        #[arg(long = "disk")]
        disks: Vec<String>,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List rules and their match counts
    List,
    /// Enable or disable a rule
    Toggle { id: String },
    /// Delete a rule
    Delete { id: String },
    /// Evaluate the rules against the files under a path
    Apply { path: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Cleanup,
    Archive,
    Organize,
    Compress,
}

impl From<KindArg> for ActionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Cleanup => ActionKind::Cleanup,
            KindArg::Archive => ActionKind::Archive,
            KindArg::Organize => ActionKind::Organize,
            KindArg::Compress => ActionKind::Compress,
        }
    }
}
