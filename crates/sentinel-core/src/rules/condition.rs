use chrono::{DateTime, Local};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "=")]
    Equal,
}

impl Comparison {
    pub fn compare(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => actual > threshold,
            Comparison::LessThan => actual < threshold,
            Comparison::Equal => actual == threshold,
        }
    }
}

fn equal() -> Comparison {
    Comparison::Equal
}

fn greater_than() -> Comparison {
    Comparison::GreaterThan
}

/// A single typed predicate over file metadata.
///
/// Serialized with a `type` tag, e.g.
/// `{"type": "size_mb", "operator": ">", "value": 100}`. Condition types this
/// build does not know deserialize to [`Condition::Unknown`], which always
/// passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    FilenameContains {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Shell-style glob against the file name.
    FilenameMatches { value: String },
    ExtensionIs { value: String },
    SizeMb {
        #[serde(default = "equal")]
        operator: Comparison,
        value: f64,
    },
    /// Fails when the record has no modification time.
    AgeDays {
        #[serde(default = "greater_than")]
        operator: Comparison,
        value: f64,
    },
    FolderContains { value: String },
    /// Regex search (not full match) against the file name.
    RegexMatch { value: String },
    #[serde(other)]
    Unknown,
}

impl Condition {
    pub fn matches(&self, file: &FileRecord, now: DateTime<Local>) -> bool {
        match self {
            Condition::FilenameContains { value, case_sensitive } => {
                if *case_sensitive {
                    file.name.contains(value.as_str())
                } else {
                    file.name.to_lowercase().contains(&value.to_lowercase())
                }
            }
            Condition::FilenameMatches { value } => match Pattern::new(value) {
                Ok(pattern) => pattern.matches(&file.name),
                Err(e) => {
                    warn!("Invalid glob pattern '{}': {}", value, e);
                    false
                }
            },
            Condition::ExtensionIs { value } => file.extension == *value,
            Condition::SizeMb { operator, value } => operator.compare(file.size_mb(), *value),
            Condition::AgeDays { operator, value } => match file.age_days(now) {
                Some(age) => operator.compare(age as f64, *value),
                None => false,
            },
            Condition::FolderContains { value } => file.path.contains(value.as_str()),
            Condition::RegexMatch { value } => match Regex::new(value) {
                Ok(re) => re.is_match(&file.name),
                Err(e) => {
                    warn!("Invalid regex '{}': {}", value, e);
                    false
                }
            },
            Condition::Unknown => true,
        }
    }
}

/// Conjunction of all conditions, stopping at the first failure.
pub fn evaluate(file: &FileRecord, conditions: &[Condition], now: DateTime<Local>) -> bool {
    conditions.iter().all(|c| c.matches(file, now))
}
