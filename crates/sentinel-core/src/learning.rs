use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::LearningConfig;
use crate::error::Result;
use crate::events::{EventCategory, EventSink};
use crate::persist;
use crate::recommend::{sort_by_confidence, Action, ActionKind};

const NEUTRAL_CONFIDENCE: u8 = 50;
const SUPPRESS_BELOW: u8 = 30;
const DEFAULT_CLEANUP_AGE_DAYS: f64 = 30.0;

/// Optional facts attached to a recorded action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_freed_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub timestamp: DateTime<Local>,
    pub kind: ActionKind,
    pub accepted: bool,
    pub details: ActionDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub accepted: BTreeMap<ActionKind, u32>,
    pub rejected: BTreeMap<ActionKind, u32>,
    pub organization_style: String,
    /// Folder path to the organization style last accepted there.
    pub folder_patterns: BTreeMap<String, String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            accepted: BTreeMap::new(),
            rejected: BTreeMap::new(),
            organization_style: "by_type".to_string(),
            folder_patterns: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Habits {
    pub cleanup_frequency: u32,
    pub organize_frequency: u32,
    pub archive_frequency: u32,
    /// Running average, each accepted cleanup halves the weight of history.
    pub avg_cleanup_age_days: f64,
}

impl Default for Habits {
    fn default() -> Self {
        Self {
            cleanup_frequency: 0,
            organize_frequency: 0,
            archive_frequency: 0,
            avg_cleanup_age_days: DEFAULT_CLEANUP_AGE_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningStats {
    pub total_actions: u64,
    pub files_cleaned: u64,
    pub files_organized: u64,
    pub files_archived: u64,
    pub space_freed_mb: f64,
    pub learning_since: DateTime<Local>,
}

impl Default for LearningStats {
    fn default() -> Self {
        Self {
            total_actions: 0,
            files_cleaned: 0,
            files_organized: 0,
            files_archived: 0,
            space_freed_mb: 0.0,
            learning_since: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningMemory {
    pub actions: Vec<UserAction>,
    pub preferences: Preferences,
    pub habits: Habits,
    pub stats: LearningStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub kind: ActionKind,
    pub confidence: u8,
}

/// Derived view used by reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningSummary {
    pub stats: LearningStats,
    pub favorite_action: Option<(ActionKind, u32)>,
    pub recorded_actions: usize,
    pub preferred_cleanup_age: i64,
    pub prediction: Option<Prediction>,
}

/// Accept/reject history and the preferences derived from it. Every recorded
/// action rewrites the memory file.
pub struct LearningStore {
    memory_file: PathBuf,
    action_log_cap: usize,
    prediction_window: usize,
    memory: LearningMemory,
    sink: Arc<dyn EventSink>,
}

impl LearningStore {
    /// Load the memory file. Missing or corrupted memory starts fresh.
    pub fn load(config: &LearningConfig, sink: Arc<dyn EventSink>) -> Self {
        let memory = persist::load_json(&config.memory_file).unwrap_or_default();
        Self {
            memory_file: config.memory_file.clone(),
            action_log_cap: config.action_log_cap,
            prediction_window: config.prediction_window,
            memory,
            sink,
        }
    }

    pub fn memory(&self) -> &LearningMemory {
        &self.memory
    }

    pub fn record_action(&mut self, kind: ActionKind, details: ActionDetails, accepted: bool) -> Result<()> {
        let memory = &mut self.memory;

        if accepted {
            *memory.preferences.accepted.entry(kind).or_insert(0) += 1;
            let files = details.files_count.unwrap_or(0);
            match kind {
                ActionKind::Cleanup => {
                    memory.habits.cleanup_frequency += 1;
                    if let Some(age) = details.age_days {
                        memory.habits.avg_cleanup_age_days =
                            (memory.habits.avg_cleanup_age_days + age as f64) / 2.0;
                    }
                    memory.stats.files_cleaned += files;
                }
                ActionKind::Organize => {
                    memory.habits.organize_frequency += 1;
                    if let Some(style) = &details.style {
                        memory.preferences.organization_style = style.clone();
                        if let Some(folder) = &details.folder {
                            memory
                                .preferences
                                .folder_patterns
                                .insert(folder.clone(), style.clone());
                            self.sink.log_event(
                                EventCategory::Info,
                                &format!("Learned: organize {} {}", folder, style),
                            );
                        }
                    }
                    memory.stats.files_organized += files;
                }
                ActionKind::Archive => {
                    memory.habits.archive_frequency += 1;
                    memory.stats.files_archived += files;
                }
                ActionKind::Compress => {}
            }
            if let Some(space) = details.space_freed_mb {
                memory.stats.space_freed_mb += space;
            }
        } else {
            *memory.preferences.rejected.entry(kind).or_insert(0) += 1;
        }
        memory.stats.total_actions += 1;

        memory.actions.push(UserAction {
            timestamp: Local::now(),
            kind,
            accepted,
            details,
        });
        if memory.actions.len() > self.action_log_cap {
            let excess = memory.actions.len() - self.action_log_cap;
            memory.actions.drain(..excess);
        }

        persist::save_json(&self.memory_file, &self.memory)?;
        debug!("Recorded {} action (accepted: {})", kind, accepted);
        Ok(())
    }

    /// Share of accepted suggestions of this kind, 0 to 100, rounded down.
    pub fn action_confidence(&self, kind: ActionKind) -> u8 {
        let accepted = self.memory.preferences.accepted.get(&kind).copied().unwrap_or(0);
        let rejected = self.memory.preferences.rejected.get(&kind).copied().unwrap_or(0);
        let total = accepted + rejected;
        if total == 0 {
            return NEUTRAL_CONFIDENCE;
        }
        (accepted * 100 / total) as u8
    }

    pub fn should_suggest(&self, kind: ActionKind) -> bool {
        self.action_confidence(kind) >= SUPPRESS_BELOW
    }

    /// Drop kinds the user keeps rejecting and blend the rest with history.
    pub fn personalize(&self, actions: Vec<Action>) -> Vec<Action> {
        let mut personalized: Vec<Action> = actions
            .into_iter()
            .filter(|a| self.should_suggest(a.kind))
            .map(|mut a| {
                let history = self.action_confidence(a.kind) as u32;
                // 70% base, 30% history, truncated
                a.confidence = ((a.confidence as u32 * 7 + history * 3) / 10) as u8;
                a.learned = true;
                a
            })
            .collect();
        sort_by_confidence(&mut personalized);
        personalized
    }

    /// Most frequently accepted kind in the recent window. Ties go to the
    /// kind accepted first within the window.
    pub fn predict_next_action(&self) -> Option<Prediction> {
        let actions = &self.memory.actions;
        let recent = &actions[actions.len().saturating_sub(self.prediction_window)..];
        if recent.is_empty() {
            return None;
        }

        let mut counts: Vec<(ActionKind, usize)> = Vec::new();
        for action in recent.iter().filter(|a| a.accepted) {
            match counts.iter_mut().find(|(k, _)| *k == action.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((action.kind, 1)),
            }
        }

        let (kind, count) = counts
            .into_iter()
            .fold(None::<(ActionKind, usize)>, |best, (k, n)| match best {
                Some((_, b)) if b >= n => best,
                _ => Some((k, n)),
            })?;

        Some(Prediction {
            kind,
            confidence: (count * 100 / recent.len()) as u8,
        })
    }

    pub fn preferred_cleanup_age(&self) -> i64 {
        self.memory.habits.avg_cleanup_age_days as i64
    }

    pub fn organization_style(&self) -> &str {
        &self.memory.preferences.organization_style
    }

    pub fn folder_pattern(&self, folder: &str) -> Option<&str> {
        self.memory
            .preferences
            .folder_patterns
            .get(folder)
            .map(String::as_str)
    }

    pub fn summary(&self) -> LearningSummary {
        let favorite_action = self
            .memory
            .preferences
            .accepted
            .iter()
            .fold(None::<(ActionKind, u32)>, |best, (k, n)| match best {
                Some((_, b)) if b >= *n => best,
                _ => Some((*k, *n)),
            });

        LearningSummary {
            stats: self.memory.stats.clone(),
            favorite_action,
            recorded_actions: self.memory.actions.len(),
            preferred_cleanup_age: self.preferred_cleanup_age(),
            prediction: self.predict_next_action(),
        }
    }

    pub fn report(&self) -> String {
        let summary = self.summary();
        let mut out = Vec::new();
        out.push("SENTINEL LEARNING REPORT".to_string());
        out.push(format!(
            "Learning since: {}",
            summary.stats.learning_since.format("%Y-%m-%d %H:%M")
        ));
        out.push(format!("Total actions observed: {}", summary.stats.total_actions));
        out.push(String::new());
        out.push("PREFERENCES:".to_string());
        if let Some((kind, count)) = summary.favorite_action {
            out.push(format!("   - Most used action: {} ({} times)", kind, count));
        }
        out.push(format!("   - Organization style: {}", self.organization_style()));
        out.push(format!(
            "   - Preferred cleanup age: {} days",
            summary.preferred_cleanup_age
        ));
        if let Some(prediction) = summary.prediction {
            out.push(String::new());
            out.push("PREDICTION:".to_string());
            out.push(format!("   - Next likely action: {}", prediction.kind));
            out.push(format!("   - Confidence: {}%", prediction.confidence));
        }
        out.push(String::new());
        out.push("STATISTICS:".to_string());
        out.push(format!("   - Files cleaned: {}", summary.stats.files_cleaned));
        out.push(format!("   - Files organized: {}", summary.stats.files_organized));
        out.push(format!("   - Files archived: {}", summary.stats.files_archived));
        out.push(format!("   - Space freed: {:.1} MB", summary.stats.space_freed_mb));
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SilentSink;
    use crate::recommend::{ActionSource, ActionTargets};
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> LearningStore {
        let config = LearningConfig {
            memory_file: dir.join("memory.json"),
            ..Default::default()
        };
        LearningStore::load(&config, Arc::new(SilentSink))
    }

    fn action(kind: ActionKind, confidence: u8) -> Action {
        Action {
            kind,
            description: kind.to_string(),
            confidence,
            targets: ActionTargets::None,
            source: ActionSource::Analysis,
            learned: false,
        }
    }

    #[test]
    fn test_neutral_confidence_without_history() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!(store.action_confidence(ActionKind::Archive), 50);
        assert!(store.predict_next_action().is_none());
    }

    #[test]
    fn test_cleanup_age_running_average() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let details = ActionDetails {
            age_days: Some(90),
            ..Default::default()
        };
        store.record_action(ActionKind::Cleanup, details.clone(), true).unwrap();
        assert_eq!(store.preferred_cleanup_age(), 60);
        store.record_action(ActionKind::Cleanup, details, true).unwrap();
        assert_eq!(store.preferred_cleanup_age(), 75);
    }

    #[test]
    fn test_personalize_drops_and_blends() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        for _ in 0..4 {
            store
                .record_action(ActionKind::Archive, ActionDetails::default(), false)
                .unwrap();
        }
        store
            .record_action(ActionKind::Cleanup, ActionDetails::default(), true)
            .unwrap();

        let out = store.personalize(vec![action(ActionKind::Archive, 85), action(ActionKind::Cleanup, 90)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ActionKind::Cleanup);
        // 0.7 * 90 + 0.3 * 100
        assert_eq!(out[0].confidence, 93);
        assert!(out[0].learned);
    }

    #[test]
    fn test_confidence_rounds_down_at_suppression_edge() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.memory.preferences.accepted.insert(ActionKind::Archive, 59);
        store.memory.preferences.rejected.insert(ActionKind::Archive, 141);

        // 29.5% accepted
        assert_eq!(store.action_confidence(ActionKind::Archive), 29);
        assert!(!store.should_suggest(ActionKind::Archive));
        assert!(store.personalize(vec![action(ActionKind::Archive, 80)]).is_empty());

        store.memory.preferences.accepted.insert(ActionKind::Archive, 60);
        store.memory.preferences.rejected.insert(ActionKind::Archive, 140);
        assert_eq!(store.action_confidence(ActionKind::Archive), 30);
        assert!(store.should_suggest(ActionKind::Archive));
    }

    #[test]
    fn test_prediction_over_window() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.record_action(ActionKind::Organize, ActionDetails::default(), true).unwrap();
        store.record_action(ActionKind::Cleanup, ActionDetails::default(), true).unwrap();
        store.record_action(ActionKind::Cleanup, ActionDetails::default(), true).unwrap();
        store.record_action(ActionKind::Archive, ActionDetails::default(), false).unwrap();

        let prediction = store.predict_next_action().unwrap();
        assert_eq!(prediction.kind, ActionKind::Cleanup);
        assert_eq!(prediction.confidence, 50);
    }

    #[test]
    fn test_action_log_is_capped() {
        let dir = tempdir().unwrap();
        let config = LearningConfig {
            memory_file: dir.path().join("memory.json"),
            action_log_cap: 3,
            ..Default::default()
        };
        let mut store = LearningStore::load(&config, Arc::new(SilentSink));
        for _ in 0..5 {
            store.record_action(ActionKind::Organize, ActionDetails::default(), true).unwrap();
        }
        assert_eq!(store.memory().actions.len(), 3);
        assert_eq!(store.memory().stats.total_actions, 5);
    }

    #[test]
    fn test_folder_pattern_learned() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let details = ActionDetails {
            style: Some("by_date".into()),
            folder: Some("/home/u/Pictures".into()),
            ..Default::default()
        };
        store.record_action(ActionKind::Organize, details, true).unwrap();
        assert_eq!(store.folder_pattern("/home/u/Pictures"), Some("by_date"));
        assert_eq!(store.organization_style(), "by_date");
    }
}
