use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration. Every section has defaults so an empty
/// `Sentinel.toml` (or none at all) yields a usable setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub analysis: AnalysisConfig,
    pub rules: RulesConfig,
    pub learning: LearningConfig,
    pub undo: UndoConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Files beyond this count are ignored by a single analysis pass.
    pub max_batch_size: usize,
    pub large_file_mb: f64,
    pub old_file_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            large_file_mb: 100.0,
            old_file_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub rules_file: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules_file: PathBuf::from("sentinel_rules.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub memory_file: PathBuf,
    pub action_log_cap: usize,
    pub prediction_window: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            memory_file: PathBuf::from("sentinel_memory.json"),
            action_log_cap: 1000,
            prediction_window: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub backup_dir: PathBuf,
    pub retention_days: i64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(".sentinel_backups"),
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub temp_extensions: Vec<String>,
    pub age_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            temp_extensions: [".tmp", ".bak", ".old", ".cache"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            age_days: 30,
        }
    }
}

/// Load `Sentinel.toml` (optional) and `SENTINEL__SECTION__KEY` env overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Sentinel").required(false))
        .add_source(Environment::with_prefix("SENTINEL").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Drop directories nested under another directory in the list.
pub fn non_overlapping_directories(dirs: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();

    for dir in dirs {
        let candidate = Path::new(dir);
        if kept.iter().any(|k| candidate.starts_with(k)) {
            continue;
        }
        kept.retain(|k| !Path::new(k).starts_with(candidate));
        kept.push(dir.clone());
    }

    kept
}
