use chrono::{Duration, Local};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use sentinel_core::config::RulesConfig;
use sentinel_core::rules::{Comparison, Condition, NewRule, RuleAction, RuleUpdate};
use sentinel_core::{FileRecord, RulesEngine, SilentSink};

fn load(root: &Path) -> RulesEngine {
    let config = RulesConfig {
        rules_file: root.join("sentinel_rules.json"),
    };
    RulesEngine::load(&config, Arc::new(SilentSink)).unwrap()
}

fn pdf_rule(name: &str, priority: i32, stop_on_match: bool, destination: &str) -> NewRule {
    NewRule {
        name: name.to_string(),
        conditions: vec![Condition::ExtensionIs {
            value: ".pdf".to_string(),
        }],
        actions: vec![RuleAction::Move {
            destination: destination.to_string(),
        }],
        priority,
        stop_on_match,
    }
}

/// An engine with the default rules removed.
fn empty_engine(root: &Path) -> RulesEngine {
    let mut engine = load(root);
    engine.delete_rule("rule_1").unwrap();
    engine.delete_rule("rule_2").unwrap();
    engine
}

#[test]
fn test_defaults_seeded_and_persisted() {
    let tmp = tempdir().unwrap();
    let engine = load(tmp.path());

    let names: Vec<&str> = engine.rules().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Screenshots to Screenshots folder", "Old downloads cleanup"]
    );
    assert_eq!(engine.rules()[0].priority, 10);
    assert_eq!(engine.rules()[1].priority, 5);
    assert!(tmp.path().join("sentinel_rules.json").exists());
}

#[test]
fn test_default_downloads_rule() {
    let tmp = tempdir().unwrap();
    let mut engine = load(tmp.path());
    let now = Local::now();
    let files = vec![
        FileRecord::new("/home/u/Downloads/setup.exe", 10, Some(now - Duration::days(120))),
        FileRecord::new("/home/u/Downloads/fresh.zip", 10, Some(now - Duration::days(3))),
        FileRecord::new("/home/u/Downloads/unknown.bin", 10, None),
    ];

    let results = engine.apply_rules(&files, now).unwrap();
    assert_eq!(results.len(), 1);
    let matches = &results["/home/u/Downloads/setup.exe"];
    assert_eq!(matches[0].rule_name, "Old downloads cleanup");
    assert_eq!(
        matches[0].action,
        RuleAction::Archive {
            destination: "Old Downloads".to_string()
        }
    );
}

#[test]
fn test_stop_on_match_respects_priority() {
    let tmp = tempdir().unwrap();
    let mut engine = empty_engine(tmp.path());
    let low = engine.add_rule(pdf_rule("low", 1, false, "Low")).unwrap();
    let high = engine.add_rule(pdf_rule("high", 10, true, "High")).unwrap();

    let files = vec![FileRecord::new("/docs/report.pdf", 10, None)];
    let results = engine.apply_rules(&files, Local::now()).unwrap();
    let matches = &results["/docs/report.pdf"];
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule_id, high);
    assert_eq!(engine.get_rule(&high).unwrap().match_count, 1);
    assert_eq!(engine.get_rule(&low).unwrap().match_count, 0);

    // Without stop_on_match both fire, higher priority first
    engine
        .update_rule(
            &high,
            RuleUpdate {
                stop_on_match: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    let results = engine.apply_rules(&files, Local::now()).unwrap();
    let ids: Vec<&str> = results["/docs/report.pdf"]
        .iter()
        .map(|m| m.rule_id.as_str())
        .collect();
    assert_eq!(ids, vec![high.as_str(), low.as_str()]);
}

#[test]
fn test_equal_priority_keeps_stored_order() {
    let tmp = tempdir().unwrap();
    let mut engine = empty_engine(tmp.path());
    let first = engine.add_rule(pdf_rule("first", 3, false, "A")).unwrap();
    let second = engine.add_rule(pdf_rule("second", 3, false, "B")).unwrap();

    let files = vec![FileRecord::new("/docs/a.pdf", 10, None)];
    let results = engine.apply_rules(&files, Local::now()).unwrap();
    let ids: Vec<&str> = results["/docs/a.pdf"].iter().map(|m| m.rule_id.as_str()).collect();
    assert_eq!(ids, vec![first.as_str(), second.as_str()]);
}

#[test]
fn test_disabled_rules_are_skipped() {
    let tmp = tempdir().unwrap();
    let mut engine = empty_engine(tmp.path());
    let id = engine.add_rule(pdf_rule("pdfs", 1, false, "Docs")).unwrap();
    assert!(!engine.toggle_rule(&id).unwrap());

    let files = vec![FileRecord::new("/docs/a.pdf", 10, None)];
    assert!(engine.apply_rules(&files, Local::now()).unwrap().is_empty());
}

#[test]
fn test_match_counts_persist() {
    let tmp = tempdir().unwrap();
    {
        let mut engine = load(tmp.path());
        let files = vec![FileRecord::new("/pics/Screenshot 3.png", 10, None)];
        engine.apply_rules(&files, Local::now()).unwrap();
    }
    let engine = load(tmp.path());
    assert_eq!(engine.get_rule("rule_1").unwrap().match_count, 1);
}

#[test]
fn test_corrupted_store_resets_to_defaults() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("sentinel_rules.json"), "{{ not json").unwrap();
    let engine = load(tmp.path());
    assert_eq!(engine.rules().len(), 2);
}

#[test]
fn test_rules_file_round_trips_condition_json() {
    let tmp = tempdir().unwrap();
    let json = r#"[{
        "id": "rule_7",
        "name": "huge videos",
        "enabled": true,
        "conditions": [
            {"type": "size_mb", "operator": ">", "value": 500},
            {"type": "regex_match", "value": "^clip_\\d+"}
        ],
        "actions": [{"type": "archive", "destination": "Cold"}],
        "priority": 2,
        "created_at": "2024-01-01T10:00:00+00:00"
    }]"#;
    fs::write(tmp.path().join("sentinel_rules.json"), json).unwrap();

    let mut engine = load(tmp.path());
    let rule = engine.get_rule("rule_7").unwrap();
    assert_eq!(
        rule.conditions[0],
        Condition::SizeMb {
            operator: Comparison::GreaterThan,
            value: 500.0
        }
    );
    assert!(!rule.stop_on_match);

    let files = vec![
        FileRecord::new("/v/clip_12.mp4", 600 * 1024 * 1024, None),
        FileRecord::new("/v/movie.mp4", 600 * 1024 * 1024, None),
    ];
    let results = engine.apply_rules(&files, Local::now()).unwrap();
    assert!(results.contains_key("/v/clip_12.mp4"));
    assert!(!results.contains_key("/v/movie.mp4"));

    let id = engine.add_rule(pdf_rule("next", 0, false, "x")).unwrap();
    assert_eq!(id, "rule_8");
}

#[test]
fn test_hand_written_rules_keep_optional_fields_optional() {
    let tmp = tempdir().unwrap();
    let json = r#"[
        {"id": "rule_1", "name": "Mine", "enabled": false,
         "conditions": [{"type": "extension_is", "value": ".pdf"}],
         "actions": [{"type": "move", "destination": "PDFs"}],
         "priority": 7, "match_count": 3},
        {"id": "rule_2", "name": "Also mine",
         "conditions": [{"type": "extension_is", "value": ".txt"}],
         "actions": [{"type": "move", "destination": "Notes"}]}
    ]"#;
    fs::write(tmp.path().join("sentinel_rules.json"), json).unwrap();

    let engine = load(tmp.path());
    let names: Vec<&str> = engine.rules().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Mine", "Also mine"]);

    let mine = engine.get_rule("rule_1").unwrap();
    assert!(!mine.enabled);
    assert_eq!(mine.priority, 7);
    assert_eq!(mine.match_count, 3);

    let also = engine.get_rule("rule_2").unwrap();
    assert!(also.enabled);
    assert_eq!(also.priority, 0);
}
