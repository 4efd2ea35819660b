//! Ranked, confidence-scored recommendations for a batch of files.
//!
//! Classifier histograms, pattern findings and custom rule matches are folded
//! into a single action list. Confidence values are fixed heuristics per
//! candidate; ordering is a stable sort so equal confidences keep the order
//! they were produced in.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::classifier::{categorize, Category};
use crate::config::AnalysisConfig;
use crate::learning::LearningStore;
use crate::model::{total_size_mb, FileRecord};
use crate::patterns::{detect_all, DetectorThresholds, PatternReport};
use crate::rules::{RuleAction, RuleMatch};

const MAX_REPORTED_ACTIONS: usize = 5;
const RULE_CONFIDENCE: u8 = 80;
const LARGE_COLLECTION_MB: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Cleanup,
    Archive,
    Organize,
    Compress,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Cleanup => "cleanup",
            ActionKind::Archive => "archive",
            ActionKind::Organize => "organize",
            ActionKind::Compress => "compress",
        }
    }

    /// Map a rule action onto a recommendation kind. Unknown actions have none.
    pub fn from_rule_action(action: &RuleAction) -> Option<Self> {
        match action {
            RuleAction::Move { .. } | RuleAction::Copy { .. } => Some(ActionKind::Organize),
            RuleAction::Archive { .. } => Some(ActionKind::Archive),
            RuleAction::Delete => Some(ActionKind::Cleanup),
            RuleAction::Other => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum ActionTargets {
    None,
    Files(Vec<String>),
    Categories(Vec<Category>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSource {
    Analysis,
    CustomRule { rule_id: String, rule_name: String },
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub description: String,
    pub confidence: u8,
    pub targets: ActionTargets,
    pub source: ActionSource,
    #[serde(default)]
    pub learned: bool,
}

impl Action {
    fn analysis(kind: ActionKind, description: String, confidence: u8, targets: ActionTargets) -> Self {
        Self {
            kind,
            description,
            confidence,
            targets,
            source: ActionSource::Analysis,
            learned: false,
        }
    }
}

/// Stable descending sort by confidence.
pub fn sort_by_confidence(actions: &mut [Action]) {
    actions.sort_by(|a, b| b.confidence.cmp(&a.confidence));
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CategorySummary {
    pub count: usize,
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub total_files: usize,
    pub total_size_mb: f64,
    /// Files dropped because the batch exceeded the configured bound.
    pub skipped: usize,
    pub categories: BTreeMap<Category, CategorySummary>,
    pub patterns: PatternReport,
    /// At most five, highest confidence first.
    pub actions: Vec<Action>,
    pub insights: Vec<String>,
}

fn paths(files: &[FileRecord]) -> Vec<String> {
    files.iter().map(|f| f.path.clone()).collect()
}

/// Builder-style generator. Rule matches and the learning store are optional
/// inputs supplied by the caller.
pub struct Recommender<'a> {
    config: &'a AnalysisConfig,
    rule_matches: Option<&'a BTreeMap<String, Vec<RuleMatch>>>,
    learning: Option<&'a LearningStore>,
}

impl<'a> Recommender<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            rule_matches: None,
            learning: None,
        }
    }

    pub fn with_rule_matches(mut self, matches: &'a BTreeMap<String, Vec<RuleMatch>>) -> Self {
        self.rule_matches = Some(matches);
        self
    }

    /// Personalize confidences from the user's accept/reject history.
    pub fn with_learning(mut self, learning: &'a LearningStore) -> Self {
        self.learning = Some(learning);
        self
    }

    pub fn generate(&self, files: &[FileRecord], now: DateTime<Local>) -> Recommendations {
        let bound = self.config.max_batch_size.min(files.len());
        let batch = &files[..bound];
        let skipped = files.len() - bound;
        if skipped > 0 {
            debug!("Analysis bounded to {} files, {} skipped", bound, skipped);
        }

        let categorized = categorize(batch);
        let patterns = detect_all(
            batch,
            now,
            DetectorThresholds {
                large_file_mb: self.config.large_file_mb,
                old_file_days: self.config.old_file_days,
            },
        );
        let total_size = total_size_mb(batch);

        let mut actions = builtin_actions(&categorized, &patterns);
        if let Some(matches) = self.rule_matches {
            actions.extend(rule_actions(matches));
        }
        sort_by_confidence(&mut actions);

        if let Some(learning) = self.learning {
            actions = learning.personalize(actions);
        }
        actions.truncate(MAX_REPORTED_ACTIONS);

        let mut insights = pattern_insights(&patterns, self.config.old_file_days);
        insights.extend(strategic_insights(&categorized, &patterns, total_size));
        if let Some(prediction) = self.learning.and_then(|l| l.predict_next_action()) {
            insights.push(format!(
                "Based on recent activity you will likely {} next ({}% confidence)",
                prediction.kind, prediction.confidence
            ));
        }

        let categories = categorized
            .iter()
            .map(|(category, files)| {
                (
                    *category,
                    CategorySummary {
                        count: files.len(),
                        size_mb: total_size_mb(files),
                    },
                )
            })
            .collect();

        Recommendations {
            total_files: batch.len(),
            total_size_mb: total_size,
            skipped,
            categories,
            patterns,
            actions,
            insights,
        }
    }
}

fn builtin_actions(categorized: &BTreeMap<Category, Vec<FileRecord>>, patterns: &PatternReport) -> Vec<Action> {
    let mut actions = Vec::new();

    if let Some(temp) = categorized.get(&Category::Temporary) {
        actions.push(Action::analysis(
            ActionKind::Cleanup,
            format!(
                "Clean {} temporary files to free {:.1} MB",
                temp.len(),
                total_size_mb(temp)
            ),
            95,
            ActionTargets::Files(paths(temp)),
        ));
    }

    if let Some(installers) = categorized.get(&Category::Installers) {
        actions.push(Action::analysis(
            ActionKind::Archive,
            format!(
                "Archive {} installer files ({:.1} MB)",
                installers.len(),
                total_size_mb(installers)
            ),
            85,
            ActionTargets::Files(paths(installers)),
        ));
    }

    let media_count: usize = Category::MEDIA
        .iter()
        .map(|c| categorized.get(c).map_or(0, Vec::len))
        .sum();
    if media_count > 20 {
        actions.push(Action::analysis(
            ActionKind::Organize,
            format!("Organize {} media files into type-specific folders", media_count),
            90,
            ActionTargets::Categories(Category::MEDIA.to_vec()),
        ));
    }

    if !patterns.large_files.is_empty() {
        actions.push(Action::analysis(
            ActionKind::Compress,
            format!(
                "Compress {} large files ({:.1} MB) to save space",
                patterns.large_files.len(),
                total_size_mb(&patterns.large_files)
            ),
            70,
            ActionTargets::Files(paths(&patterns.large_files)),
        ));
    }

    if let Some(documents) = categorized.get(&Category::Documents) {
        if documents.len() > 10 {
            actions.push(Action::analysis(
                ActionKind::Archive,
                format!("Archive {} document files for long-term storage", documents.len()),
                75,
                ActionTargets::Files(paths(documents)),
            ));
        }
    }

    if categorized.len() > 5 {
        actions.push(Action::analysis(
            ActionKind::Organize,
            format!("Create category-based folder structure for {} file types", categorized.len()),
            85,
            ActionTargets::None,
        ));
    }

    actions
}

/// One action per (rule, rule action) pair, targeting every file it matched.
fn rule_actions(matches: &BTreeMap<String, Vec<RuleMatch>>) -> Vec<Action> {
    let mut grouped: Vec<(&RuleMatch, ActionKind, Vec<String>)> = Vec::new();

    for (path, file_matches) in matches {
        for m in file_matches {
            let Some(kind) = ActionKind::from_rule_action(&m.action) else {
                continue;
            };
            match grouped
                .iter_mut()
                .find(|(g, _, _)| g.rule_id == m.rule_id && g.action == m.action)
            {
                Some((_, _, files)) => files.push(path.clone()),
                None => grouped.push((m, kind, vec![path.clone()])),
            }
        }
    }

    grouped
        .into_iter()
        .map(|(m, kind, files)| Action {
            kind,
            description: format!("Rule '{}': {} ({} files)", m.rule_name, m.action, files.len()),
            confidence: RULE_CONFIDENCE,
            targets: ActionTargets::Files(files),
            source: ActionSource::CustomRule {
                rule_id: m.rule_id.clone(),
                rule_name: m.rule_name.clone(),
            },
            learned: false,
        })
        .collect()
}

fn pattern_insights(patterns: &PatternReport, old_file_days: i64) -> Vec<String> {
    let mut insights = Vec::new();

    if !patterns.duplicates.is_empty() {
        insights.push(format!(
            "Detected {} potential duplicate name patterns",
            patterns.duplicates.len()
        ));
    }
    if patterns.naming.is_chaotic() {
        insights.push(format!(
            "Inconsistent naming: {} camelCase, {} snake_case, {} kebab-case names",
            patterns.naming.camel_case, patterns.naming.snake_case, patterns.naming.kebab_case
        ));
    }
    if !patterns.old_files.is_empty() {
        insights.push(format!(
            "Found {} files older than {} days",
            patterns.old_files.len(),
            old_file_days
        ));
    }
    for pair in &patterns.backup_pairs {
        insights.push(format!(
            "'{}' has {} backup copies alongside the original",
            pair.base_name,
            pair.backups.len()
        ));
    }
    if !patterns.photo_batches.is_empty() {
        insights.push(format!(
            "Found {} photo batches taken within the same hour",
            patterns.photo_batches.len()
        ));
    }
    for project in &patterns.projects {
        insights.push(format!(
            "{} looks like a code project ({}% confidence), keep it together",
            project.path, project.confidence
        ));
    }

    insights
}

fn strategic_insights(
    categorized: &BTreeMap<Category, Vec<FileRecord>>,
    patterns: &PatternReport,
    total_size: f64,
) -> Vec<String> {
    let mut insights = Vec::new();

    if total_size > LARGE_COLLECTION_MB {
        insights.push(format!(
            "Large collection detected ({:.1} MB). Consider archiving or cloud storage.",
            total_size
        ));
    }

    let total: usize = categorized.values().map(Vec::len).sum();
    let uncategorized = categorized.get(&Category::Uncategorized).map_or(0, Vec::len);
    let largest = categorized
        .iter()
        .fold(None::<(&Category, usize)>, |best, (c, files)| match best {
            Some((_, n)) if n >= files.len() => best,
            _ => Some((c, files.len())),
        });
    if let Some((category, count)) = largest {
        if count > uncategorized * 2 {
            let percentage = count as f64 / total as f64 * 100.0;
            insights.push(format!(
                "{} files dominate ({:.0}%) - specialized organization recommended",
                category.title(),
                percentage
            ));
        }
    }

    if patterns.duplicates.len() > 5 {
        insights.push("High duplicate pattern count suggests manual review needed".to_string());
    }
    if !patterns.series.is_empty() {
        insights.push(format!(
            "Detected {} file series - consider grouping into subfolders",
            patterns.series.len()
        ));
    }

    insights
}

impl Recommendations {
    /// Plain-text report for terminals and logs.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        out.push("SENTINEL ANALYSIS REPORT".to_string());
        out.push(format!(
            "Scanned: {} files | Total: {:.1} MB",
            self.total_files, self.total_size_mb
        ));
        if self.skipped > 0 {
            out.push(format!("Skipped: {} files beyond the batch limit", self.skipped));
        }

        if !self.categories.is_empty() {
            out.push(String::new());
            out.push("CATEGORIES:".to_string());
            let mut by_count: Vec<_> = self.categories.iter().collect();
            by_count.sort_by(|a, b| b.1.count.cmp(&a.1.count));
            for (category, summary) in by_count {
                let percentage = summary.count as f64 / self.total_files as f64 * 100.0;
                out.push(format!(
                    "   - {}: {} files ({:.1} MB) - {:.0}%",
                    category.title(),
                    summary.count,
                    summary.size_mb,
                    percentage
                ));
            }
        }

        if !self.actions.is_empty() {
            out.push(String::new());
            out.push("RECOMMENDATIONS:".to_string());
            for (idx, action) in self.actions.iter().enumerate() {
                out.push(format!(
                    "   {}. [{}] {} (Confidence: {}%)",
                    idx + 1,
                    action.kind,
                    action.description,
                    action.confidence
                ));
            }
        }

        if !self.insights.is_empty() {
            out.push(String::new());
            out.push("INSIGHTS:".to_string());
            for insight in &self.insights {
                out.push(format!("   - {}", insight));
            }
        }

        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size_mb: f64) -> FileRecord {
        FileRecord::new(format!("/data/{}", name), (size_mb * 1024.0 * 1024.0) as u64, None)
    }

    #[test]
    fn test_empty_batch_has_no_actions() {
        let config = AnalysisConfig::default();
        let recs = Recommender::new(&config).generate(&[], Local::now());
        assert_eq!(recs.total_files, 0);
        assert!(recs.actions.is_empty());
        assert!(recs.insights.is_empty());
    }

    #[test]
    fn test_batch_is_bounded() {
        let config = AnalysisConfig {
            max_batch_size: 3,
            ..Default::default()
        };
        let files: Vec<_> = (0..5).map(|i| record(&format!("f{}.txt", i), 1.0)).collect();
        let recs = Recommender::new(&config).generate(&files, Local::now());
        assert_eq!(recs.total_files, 3);
        assert_eq!(recs.skipped, 2);
    }

    #[test]
    fn test_large_files_get_compress_action() {
        let config = AnalysisConfig::default();
        let files = vec![record("movie.mkv", 150.0), record("notes.txt", 0.1)];
        let recs = Recommender::new(&config).generate(&files, Local::now());
        let compress = recs
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::Compress)
            .unwrap();
        assert_eq!(compress.confidence, 70);
        assert!(compress.description.contains("150.0 MB"));
    }

    #[test]
    fn test_rule_matches_become_actions() {
        let mut matches = BTreeMap::new();
        matches.insert(
            "/data/Screenshot 1.png".to_string(),
            vec![RuleMatch {
                rule_id: "rule_1".into(),
                rule_name: "Screens".into(),
                action: RuleAction::Move {
                    destination: "Screenshots".into(),
                },
            }],
        );
        matches.insert(
            "/data/Screenshot 2.png".to_string(),
            vec![RuleMatch {
                rule_id: "rule_1".into(),
                rule_name: "Screens".into(),
                action: RuleAction::Move {
                    destination: "Screenshots".into(),
                },
            }],
        );

        let actions = rule_actions(&matches);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Organize);
        assert_eq!(actions[0].confidence, 80);
        assert_eq!(
            actions[0].targets,
            ActionTargets::Files(vec![
                "/data/Screenshot 1.png".to_string(),
                "/data/Screenshot 2.png".to_string()
            ])
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let mut actions = vec![
            Action::analysis(ActionKind::Archive, "first".into(), 85, ActionTargets::None),
            Action::analysis(ActionKind::Cleanup, "top".into(), 95, ActionTargets::None),
            Action::analysis(ActionKind::Organize, "second".into(), 85, ActionTargets::None),
        ];
        sort_by_confidence(&mut actions);
        let order: Vec<&str> = actions.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(order, vec!["top", "first", "second"]);
    }
}
