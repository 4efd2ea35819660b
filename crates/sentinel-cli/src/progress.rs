use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sentinel_core::{EventCategory, EventSink};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Terminal sink: a spinner while scanning or analyzing, colored lines for
/// operation outcomes.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    pub fn start_spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    pub fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn set_message(&self, message: String) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(message);
            }
        }
    }

    /// Print above the spinner if one is running.
    fn println(&self, line: String) {
        match self.bar.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(pb) => pb.println(line),
                None => eprintln!("{}", line),
            },
            Err(_) => eprintln!("{}", line),
        }
    }
}

impl EventSink for CliReporter {
    fn log_event(&self, category: EventCategory, message: &str) {
        let label = format!("[{}]", category);
        let label = match category {
            EventCategory::Info => label.blue(),
            EventCategory::Cleanup => label.green(),
            EventCategory::Organize => label.cyan(),
            EventCategory::Error => label.red(),
        };
        self.println(format!("  {} {}", label, message));
    }

    fn on_scan_start(&self) {
        self.set_message("Scanning files...".to_string());
    }

    fn on_scan_progress(&self, files_found: usize) {
        self.set_message(format!("Scanning... {} files found", files_found));
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.println(format!(
            "  {} Scan complete: {} files in {:.2}s",
            "✓".green(),
            total_files,
            duration_secs
        ));
        self.set_message("Analyzing...".to_string());
    }
}
