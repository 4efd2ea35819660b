use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::condition::{evaluate, Comparison, Condition};
use crate::config::RulesConfig;
use crate::error::{Error, Result};
use crate::events::{EventCategory, EventSink};
use crate::model::FileRecord;
use crate::persist;

/// What a rule asks to happen to a matching file. Unknown action types are
/// kept as [`RuleAction::Other`] and ignored downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    Move { destination: String },
    Copy { destination: String },
    Archive { destination: String },
    Delete,
    #[serde(other)]
    Other,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Move { destination } => write!(f, "move to {}", destination),
            RuleAction::Copy { destination } => write!(f, "copy to {}", destination),
            RuleAction::Archive { destination } => write!(f, "archive to {}", destination),
            RuleAction::Delete => f.write_str("delete"),
            RuleAction::Other => f.write_str("unsupported action"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stop_on_match: bool,
    #[serde(default)]
    pub match_count: u32,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
}

fn enabled_by_default() -> bool {
    true
}

/// Fields supplied when creating a rule. The engine assigns the id.
#[derive(Debug, Clone, Default)]
pub struct NewRule {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    pub priority: i32,
    pub stop_on_match: bool,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<RuleAction>>,
    pub priority: Option<i32>,
    pub stop_on_match: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub rule_name: String,
    pub action: RuleAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesSummary {
    pub total: usize,
    pub enabled: usize,
    pub total_matches: u64,
    pub most_used: Option<(String, u32)>,
}

fn default_rules(now: DateTime<Local>) -> Vec<CustomRule> {
    vec![
        CustomRule {
            id: "rule_1".to_string(),
            name: "Screenshots to Screenshots folder".to_string(),
            enabled: true,
            conditions: vec![Condition::FilenameContains {
                value: "screenshot".to_string(),
                case_sensitive: false,
            }],
            actions: vec![RuleAction::Move {
                destination: "Screenshots".to_string(),
            }],
            priority: 10,
            stop_on_match: false,
            match_count: 0,
            created_at: now,
        },
        CustomRule {
            id: "rule_2".to_string(),
            name: "Old downloads cleanup".to_string(),
            enabled: true,
            conditions: vec![
                Condition::FolderContains {
                    value: "Downloads".to_string(),
                },
                Condition::AgeDays {
                    operator: Comparison::GreaterThan,
                    value: 90.0,
                },
            ],
            actions: vec![RuleAction::Archive {
                destination: "Old Downloads".to_string(),
            }],
            priority: 5,
            stop_on_match: false,
            match_count: 0,
            created_at: now,
        },
    ]
}

/// User-defined rules, persisted as a JSON array and rewritten on every
/// mutation.
pub struct RulesEngine {
    rules_file: PathBuf,
    rules: Vec<CustomRule>,
    sink: Arc<dyn EventSink>,
}

impl RulesEngine {
    /// Load the rule store. A missing or unreadable store is replaced by the
    /// default rule set, which is written back immediately.
    pub fn load(config: &RulesConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let rules_file = config.rules_file.clone();
        let (rules, seeded) = match persist::load_json::<Vec<CustomRule>>(&rules_file) {
            Some(rules) => (rules, false),
            None => (default_rules(Local::now()), true),
        };

        let engine = Self {
            rules_file,
            rules,
            sink,
        };
        if seeded {
            info!("Seeding default rules at {}", engine.rules_file.display());
            engine.save()?;
        }
        debug!("Loaded {} rules", engine.rules.len());
        Ok(engine)
    }

    fn save(&self) -> Result<()> {
        persist::save_json(&self.rules_file, &self.rules)
    }

    pub fn rules(&self) -> &[CustomRule] {
        &self.rules
    }

    fn next_id(&self) -> String {
        let max = self
            .rules
            .iter()
            .filter_map(|r| r.id.strip_prefix("rule_"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rule_{}", max + 1)
    }

    pub fn add_rule(&mut self, new_rule: NewRule) -> Result<String> {
        let id = self.next_id();
        self.rules.push(CustomRule {
            id: id.clone(),
            name: new_rule.name,
            enabled: true,
            conditions: new_rule.conditions,
            actions: new_rule.actions,
            priority: new_rule.priority,
            stop_on_match: new_rule.stop_on_match,
            match_count: 0,
            created_at: Local::now(),
        });
        self.save()?;
        self.sink
            .log_event(EventCategory::Info, &format!("Added rule {}", id));
        Ok(id)
    }

    pub fn get_rule(&self, id: &str) -> Option<&CustomRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn rule_mut(&mut self, id: &str) -> Result<&mut CustomRule> {
        self.rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))
    }

    pub fn update_rule(&mut self, id: &str, update: RuleUpdate) -> Result<()> {
        let rule = self.rule_mut(id)?;
        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(conditions) = update.conditions {
            rule.conditions = conditions;
        }
        if let Some(actions) = update.actions {
            rule.actions = actions;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(stop) = update.stop_on_match {
            rule.stop_on_match = stop;
        }
        self.save()
    }

    pub fn delete_rule(&mut self, id: &str) -> Result<()> {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        if self.rules.len() == before {
            return Err(Error::RuleNotFound(id.to_string()));
        }
        self.save()?;
        self.sink
            .log_event(EventCategory::Info, &format!("Deleted rule {}", id));
        Ok(())
    }

    /// Flip the enabled flag and return the new state.
    pub fn toggle_rule(&mut self, id: &str) -> Result<bool> {
        let rule = self.rule_mut(id)?;
        rule.enabled = !rule.enabled;
        let enabled = rule.enabled;
        self.save()?;
        Ok(enabled)
    }

    /// Evaluate every enabled rule against every file.
    ///
    /// Rules run in priority order (higher first, ties in stored order). A
    /// triggering rule with `stop_on_match` ends evaluation for that file.
    /// Files that trigger nothing are absent from the result. Match counters
    /// are persisted once per batch.
    pub fn apply_rules(
        &mut self,
        files: &[FileRecord],
        now: DateTime<Local>,
    ) -> Result<BTreeMap<String, Vec<RuleMatch>>> {
        let mut order: Vec<usize> = (0..self.rules.len())
            .filter(|&i| self.rules[i].enabled)
            .collect();
        order.sort_by(|&a, &b| self.rules[b].priority.cmp(&self.rules[a].priority));

        let mut results: BTreeMap<String, Vec<RuleMatch>> = BTreeMap::new();
        for file in files {
            for &idx in &order {
                let rule = &mut self.rules[idx];
                if !evaluate(file, &rule.conditions, now) {
                    continue;
                }

                rule.match_count += 1;
                let matches = results.entry(file.path.clone()).or_default();
                for action in &rule.actions {
                    matches.push(RuleMatch {
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        action: action.clone(),
                    });
                }
                debug!("Rule '{}' matched {}", rule.name, file.path);

                if rule.stop_on_match {
                    break;
                }
            }
        }

        self.save()?;
        Ok(results)
    }

    pub fn summary(&self) -> RulesSummary {
        let most_used = self
            .rules
            .iter()
            .filter(|r| r.match_count > 0)
            .fold(None::<&CustomRule>, |best, r| match best {
                Some(b) if b.match_count >= r.match_count => Some(b),
                _ => Some(r),
            })
            .map(|r| (r.name.clone(), r.match_count));

        RulesSummary {
            total: self.rules.len(),
            enabled: self.rules.iter().filter(|r| r.enabled).count(),
            total_matches: self.rules.iter().map(|r| r.match_count as u64).sum(),
            most_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SilentSink;
    use tempfile::tempdir;

    fn engine_in(dir: &std::path::Path) -> RulesEngine {
        let config = RulesConfig {
            rules_file: dir.join("rules.json"),
        };
        RulesEngine::load(&config, Arc::new(SilentSink)).unwrap()
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let dir = tempdir().unwrap();
        let mut engine = engine_in(dir.path());
        engine.delete_rule("rule_1").unwrap();
        let id = engine
            .add_rule(NewRule {
                name: "pdfs".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(id, "rule_3");
    }

    #[test]
    fn test_unknown_rule_errors() {
        let dir = tempdir().unwrap();
        let mut engine = engine_in(dir.path());
        assert!(matches!(engine.toggle_rule("rule_99"), Err(Error::RuleNotFound(_))));
        assert!(matches!(engine.delete_rule("rule_99"), Err(Error::RuleNotFound(_))));
    }

    #[test]
    fn test_summary_most_used() {
        let dir = tempdir().unwrap();
        let mut engine = engine_in(dir.path());
        let files = vec![
            FileRecord::new("/home/u/Desktop/Screenshot 1.png", 10, None),
            FileRecord::new("/home/u/Desktop/screenshot 2.png", 10, None),
        ];
        engine.apply_rules(&files, Local::now()).unwrap();
        let summary = engine.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.enabled, 2);
        assert_eq!(summary.total_matches, 2);
        assert_eq!(
            summary.most_used,
            Some(("Screenshots to Screenshots folder".to_string(), 2))
        );
    }

    #[test]
    fn test_unknown_action_deserializes() {
        let action: RuleAction = serde_json::from_str(r#"{"type": "rename", "pattern": "x"}"#).unwrap();
        assert_eq!(action, RuleAction::Other);
    }
}
