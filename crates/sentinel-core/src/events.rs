use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

/// Category attached to every reported operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Info,
    Cleanup,
    Organize,
    Error,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventCategory::Info => "INFO",
            EventCategory::Cleanup => "CLEANUP",
            EventCategory::Organize => "ORGANIZE",
            EventCategory::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Sink for operation outcomes and scan progress.
///
/// The CLI implements this with indicatif/colored output; library callers
/// inject whatever they need. All methods have default no-op implementations.
pub trait EventSink: Send + Sync {
    fn log_event(&self, _category: EventCategory, _message: &str) {}
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl EventSink for SilentSink {}

/// Forwards events to the global `tracing` subscriber.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log_event(&self, category: EventCategory, message: &str) {
        match category {
            EventCategory::Error => error!("{}", message),
            _ => info!("[{}] {}", category, message),
        }
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        info!("Scan complete: {} files in {:.2}s", total_files, duration_secs);
    }
}
