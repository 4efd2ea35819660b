use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::learning::LearningStore;
use crate::model::FileRecord;
use crate::recommend::{Action, ActionKind, ActionSource, ActionTargets};

const LARGE_UNUSED_MB: f64 = 100.0;
const LARGE_UNUSED_DAYS: i64 = 60;
const CLEANUP_NAME_HINTS: [&str; 4] = ["copy", "old", "backup", "temp"];
const HIGH_USAGE_PERCENT: f64 = 80.0;
/// Assumed growth when no usage history is available.
const WEEKLY_GROWTH_GB: f64 = 1.0;
const CONFIDENT_PREDICTION: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Age,
    TempExtension,
    LargeUnused,
    NamingPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupPrediction {
    pub file: FileRecord,
    pub actions: Vec<ActionKind>,
    pub factors: Vec<(Factor, f64)>,
    /// Mean of the factor confidences.
    pub overall_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationStrategy {
    pub method: String,
    pub confidence: u8,
    pub reasoning: Vec<String>,
}

/// Telemetry snapshot for one mounted volume, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mountpoint: String,
    pub percent: f64,
    pub free_gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpacePrediction {
    pub disk: String,
    pub urgency: Urgency,
    pub days_until_full: i64,
    pub recommended_action: ActionKind,
    pub confidence: u8,
}

pub struct PredictiveAnalyzer<'a> {
    learning: &'a LearningStore,
    temp_extensions: &'a [String],
}

impl<'a> PredictiveAnalyzer<'a> {
    pub fn new(learning: &'a LearningStore, temp_extensions: &'a [String]) -> Self {
        Self {
            learning,
            temp_extensions,
        }
    }

    /// Files the user is likely to clean up, most confident first. Files with
    /// no contributing factor are left out.
    pub fn predict_cleanup_targets(&self, files: &[FileRecord], now: DateTime<Local>) -> Vec<CleanupPrediction> {
        let preferred_age = self.learning.preferred_cleanup_age();
        let mut predictions = Vec::new();

        for file in files {
            let mut factors = Vec::new();
            let mut actions = Vec::new();
            let mut add_action = |kind: ActionKind| {
                if !actions.contains(&kind) {
                    actions.push(kind);
                }
            };
            let age = file.age_days(now);

            if let Some(age) = age {
                if age >= preferred_age {
                    let confidence = if preferred_age > 0 {
                        (age as f64 / preferred_age as f64 * 50.0).min(100.0)
                    } else {
                        100.0
                    };
                    factors.push((Factor::Age, confidence));
                    add_action(ActionKind::Cleanup);
                }
            }

            if self.temp_extensions.iter().any(|e| *e == file.extension) {
                factors.push((Factor::TempExtension, 95.0));
                add_action(ActionKind::Cleanup);
            }

            if file.size_mb() > LARGE_UNUSED_MB && age.map_or(false, |a| a > LARGE_UNUSED_DAYS) {
                factors.push((Factor::LargeUnused, 80.0));
                add_action(ActionKind::Archive);
            }

            let lowered = file.name.to_lowercase();
            if CLEANUP_NAME_HINTS.iter().any(|hint| lowered.contains(hint)) {
                factors.push((Factor::NamingPattern, 75.0));
                add_action(ActionKind::Cleanup);
            }

            if factors.is_empty() {
                continue;
            }
            let overall_confidence = factors.iter().map(|(_, c)| c).sum::<f64>() / factors.len() as f64;
            predictions.push(CleanupPrediction {
                file: file.clone(),
                actions,
                factors,
                overall_confidence,
            });
        }

        predictions.sort_by(|a, b| {
            b.overall_confidence
                .partial_cmp(&a.overall_confidence)
                .unwrap_or(Ordering::Equal)
        });
        predictions
    }

    pub fn predict_organization_needs(&self, folder: &str, files: &[FileRecord]) -> OrganizationStrategy {
        let mut strategy = OrganizationStrategy {
            method: self.learning.organization_style().to_string(),
            confidence: 85,
            reasoning: Vec::new(),
        };

        let extensions: HashSet<&str> = files.iter().map(|f| f.extension.as_str()).collect();
        if extensions.len() > 5 {
            strategy.reasoning.push("Multiple file types detected".to_string());
            strategy.confidence += 10;
        }

        if let Some(previous) = self.learning.folder_pattern(folder) {
            strategy.method = previous.to_string();
            strategy.reasoning.push(format!("Previously organized as '{}'", previous));
            strategy.confidence = 95;
        }

        strategy
    }

    /// Turn confident cleanup predictions into a single recommendation.
    pub fn cleanup_action(&self, predictions: &[CleanupPrediction]) -> Option<Action> {
        let confident: Vec<&CleanupPrediction> = predictions
            .iter()
            .filter(|p| p.overall_confidence > CONFIDENT_PREDICTION && p.actions.contains(&ActionKind::Cleanup))
            .collect();
        if confident.is_empty() {
            return None;
        }

        let mean = confident.iter().map(|p| p.overall_confidence).sum::<f64>() / confident.len() as f64;
        Some(Action {
            kind: ActionKind::Cleanup,
            description: format!("Clean up {} files you usually remove", confident.len()),
            confidence: mean.round() as u8,
            targets: ActionTargets::Files(confident.iter().map(|p| p.file.path.clone()).collect()),
            source: ActionSource::Prediction,
            learned: true,
        })
    }

    pub fn report(&self, files: &[FileRecord], disks: &[DiskUsage], now: DateTime<Local>) -> String {
        let mut out = vec!["PREDICTIVE ANALYSIS".to_string()];

        let confident: Vec<CleanupPrediction> = self
            .predict_cleanup_targets(files, now)
            .into_iter()
            .filter(|p| p.overall_confidence > CONFIDENT_PREDICTION)
            .collect();
        if !confident.is_empty() {
            out.push(String::new());
            out.push("CLEANUP PREDICTIONS:".to_string());
            out.push(format!("   - {} files predicted for cleanup", confident.len()));
            for p in confident.iter().take(5) {
                out.push(format!("   - {}: {:.0}% confidence", p.file.name, p.overall_confidence));
            }
        }

        let space = anticipate_space_issues(disks);
        if !space.is_empty() {
            out.push(String::new());
            out.push("SPACE WARNINGS:".to_string());
            for s in &space {
                out.push(format!(
                    "   - {}: about {} days until full, {} recommended",
                    s.disk, s.days_until_full, s.recommended_action
                ));
            }
        }

        if let Some(prediction) = self.learning.predict_next_action() {
            out.push(String::new());
            out.push("BEHAVIOR:".to_string());
            out.push(format!(
                "   - Likely next: {} ({}% confidence)",
                prediction.kind, prediction.confidence
            ));
        }

        out.join("\n")
    }
}

/// Linear estimate from free space, assuming steady weekly growth.
pub fn estimate_days_until_full(disk: &DiskUsage) -> i64 {
    (disk.free_gb / WEEKLY_GROWTH_GB * 7.0) as i64
}

/// Disks above 80% usage that will fill within 90 days.
pub fn anticipate_space_issues(disks: &[DiskUsage]) -> Vec<SpacePrediction> {
    disks
        .iter()
        .filter(|d| d.percent > HIGH_USAGE_PERCENT)
        .filter_map(|d| {
            let days = estimate_days_until_full(d);
            let (urgency, action, confidence) = if days < 30 {
                (Urgency::High, ActionKind::Cleanup, 90)
            } else if days < 90 {
                (Urgency::Medium, ActionKind::Archive, 70)
            } else {
                return None;
            };
            Some(SpacePrediction {
                disk: d.mountpoint.clone(),
                urgency,
                days_until_full: days,
                recommended_action: action,
                confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::events::SilentSink;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn store(dir: &std::path::Path) -> LearningStore {
        let config = LearningConfig {
            memory_file: dir.join("memory.json"),
            ..Default::default()
        };
        LearningStore::load(&config, Arc::new(SilentSink))
    }

    fn temp_exts() -> Vec<String> {
        vec![".tmp".into(), ".bak".into()]
    }

    #[test]
    fn test_cleanup_factors_average() {
        let dir = tempdir().unwrap();
        let learning = store(dir.path());
        let exts = temp_exts();
        let analyzer = PredictiveAnalyzer::new(&learning, &exts);

        // 60 days old with default preferred age 30 → age factor 100
        let old_tmp = FileRecord::new("/d/cache.tmp", 10, Some(now() - Duration::days(60)));
        let fresh = FileRecord::new("/d/fresh.txt", 10, Some(now()));
        let predictions = analyzer.predict_cleanup_targets(&[fresh, old_tmp], now());

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].file.name, "cache.tmp");
        assert_eq!(predictions[0].factors.len(), 2);
        assert!((predictions[0].overall_confidence - 97.5).abs() < 1e-9);
        assert_eq!(predictions[0].actions, vec![ActionKind::Cleanup]);
    }

    #[test]
    fn test_organization_needs_prefers_folder_pattern() {
        let dir = tempdir().unwrap();
        let mut learning = store(dir.path());
        learning
            .record_action(
                ActionKind::Organize,
                crate::learning::ActionDetails {
                    style: Some("by_date".into()),
                    folder: Some("/photos".into()),
                    ..Default::default()
                },
                true,
            )
            .unwrap();
        let exts = temp_exts();
        let analyzer = PredictiveAnalyzer::new(&learning, &exts);

        let strategy = analyzer.predict_organization_needs("/photos", &[]);
        assert_eq!(strategy.method, "by_date");
        assert_eq!(strategy.confidence, 95);

        let files: Vec<_> = [".a", ".b", ".c", ".d", ".e", ".f"]
            .iter()
            .map(|e| FileRecord::new(format!("/other/x{}", e), 1, None))
            .collect();
        let strategy = analyzer.predict_organization_needs("/other", &files);
        assert_eq!(strategy.confidence, 95);
        assert_eq!(strategy.reasoning, vec!["Multiple file types detected".to_string()]);
    }

    #[test]
    fn test_space_urgency() {
        let disks = vec![
            DiskUsage { mountpoint: "/".into(), percent: 92.0, free_gb: 2.0 },
            DiskUsage { mountpoint: "/data".into(), percent: 85.0, free_gb: 10.0 },
            DiskUsage { mountpoint: "/big".into(), percent: 85.0, free_gb: 100.0 },
            DiskUsage { mountpoint: "/home".into(), percent: 40.0, free_gb: 1.0 },
        ];
        let predictions = anticipate_space_issues(&disks);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].urgency, Urgency::High);
        assert_eq!(predictions[0].days_until_full, 14);
        assert_eq!(predictions[1].urgency, Urgency::Medium);
        assert_eq!(predictions[1].recommended_action, ActionKind::Archive);
    }
}
