mod commands;
mod logging;
mod progress;

use std::io::{self, IsTerminal, Write};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::Local;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, RulesCommand};
use dotenv::dotenv;
use progress::CliReporter;
use sentinel_core::classifier;
use sentinel_core::patterns::{self, DetectorThresholds};
use sentinel_core::scanner;
use sentinel_core::{
    spawn_analysis, ActionDetails, ActionKind, AnalysisInput, AnalysisRequest, AppConfig, CheckpointLog, DiskUsage,
    EventSink, LearningStore, Operations, PredictiveAnalyzer, RulesEngine, TracingSink,
};
use tracing::error;

/// Upper bound on files pulled into the one-shot reports.
const REPORT_FILE_LIMIT: usize = 10_000;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match sentinel_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let reporter = Arc::new(CliReporter::new());

    let result = match args.command {
        Some(command) => run(command, &config, reporter),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig, reporter: Arc<CliReporter>) -> anyhow::Result<()> {
    // Piped output gets plain log lines instead of colored event lines
    let sink: Arc<dyn EventSink> = if io::stdout().is_terminal() {
        reporter.clone()
    } else {
        Arc::new(TracingSink)
    };

    match command {
        Commands::Analyze { paths, no_learning } => {
            let roots = if paths.is_empty() { config.root_paths.clone() } else { paths };
            if roots.is_empty() {
                return Err(anyhow!("No paths given and no root_paths configured"));
            }
            run_analyze(config, roots, !no_learning, reporter)
        }
        Commands::Relationships { path } => {
            let files = scanner::scan_limited(&[path.clone()], &config.ignore_patterns, REPORT_FILE_LIMIT, sink.as_ref())?;
            print_relationships(config, &files);
            let mut extensions: Vec<String> = files.iter().map(|f| f.extension.clone()).collect();
            extensions.sort();
            extensions.dedup();
            println!();
            println!("{}", classifier::suggest_folder_structure(&path, &extensions));
            Ok(())
        }
        Commands::Rules(sub) => run_rules(config, sub, sink),
        Commands::Cleanup {
            folder,
            age_days,
            dry_run,
            yes,
        } => {
            let mut log = CheckpointLog::open(&config.undo, sink.clone())?;
            let mut learning = LearningStore::load(&config.learning, sink.clone());
            // Learned age once a cleanup has been accepted, configured age before that
            let age_days = age_days.unwrap_or_else(|| {
                if learning.memory().habits.cleanup_frequency > 0 {
                    learning.preferred_cleanup_age()
                } else {
                    config.cleanup.age_days
                }
            });
            if !dry_run && !yes && !confirm(&format!("Clean files older than {} days in {}?", age_days, folder.display()))? {
                return Ok(());
            }

            let report = Operations::new(&config.cleanup, &mut log, &mut learning, sink)
                .cleanup_temp_files(&folder, age_days, dry_run)?;
            if report.dry_run {
                for c in &report.candidates {
                    println!("  would remove {} ({:.2} MB, {:?})", c.path.display(), c.size_mb, c.reason);
                }
            }
            println!(
                "{} files removed, {} MB freed",
                report.files_removed.to_string().green(),
                format!("{:.2}", report.space_freed_mb).green()
            );
            print_outcome(report.checkpoint_id.as_deref(), &report.errors);
            Ok(())
        }
        Commands::Archive {
            to,
            files,
            dry_run,
            yes,
        } => {
            let mut log = CheckpointLog::open(&config.undo, sink.clone())?;
            let mut learning = LearningStore::load(&config.learning, sink.clone());
            if !dry_run && !yes && !confirm(&format!("Archive {} files to {}?", files.len(), to.display()))? {
                return Ok(());
            }

            let report = Operations::new(&config.cleanup, &mut log, &mut learning, sink)
                .archive_files(&files, &to, dry_run)?;
            print_moves(report.dry_run, &report.moves);
            println!("{} files archived", report.files_archived.to_string().green());
            print_outcome(report.checkpoint_id.as_deref(), &report.errors);
            Ok(())
        }
        Commands::Organize { folder, dry_run, yes } => {
            let mut log = CheckpointLog::open(&config.undo, sink.clone())?;
            let mut learning = LearningStore::load(&config.learning, sink.clone());
            if !dry_run && !yes && !confirm(&format!("Organize {} by file type?", folder.display()))? {
                return Ok(());
            }

            let report = Operations::new(&config.cleanup, &mut log, &mut learning, sink)
                .organize_by_type(&folder, dry_run)?;
            print_moves(report.dry_run, &report.moves);
            println!(
                "{} files organized, new folders: {}",
                report.files_organized.to_string().green(),
                report.folders_created.join(", ")
            );
            print_outcome(report.checkpoint_id.as_deref(), &report.errors);
            Ok(())
        }
        Commands::Undo { checkpoint_id } => {
            let mut log = CheckpointLog::open(&config.undo, sink)?;
            let report = match checkpoint_id {
                Some(id) => log.undo_checkpoint(&id)?,
                None => log.undo_last()?,
            };
            println!(
                "Checkpoint {}: {} files restored",
                report.checkpoint_id.cyan(),
                report.files_restored.to_string().green()
            );
            for e in &report.errors {
                println!("  {} {}", "!".red(), e);
            }
            Ok(())
        }
        Commands::History { limit } => {
            let log = CheckpointLog::open(&config.undo, sink)?;
            let history = log.history(limit);
            if history.is_empty() {
                println!("No checkpoints recorded");
            }
            for c in history {
                let state = format!("{:?}", c.state).to_lowercase();
                let state = if c.can_undo() { state.green() } else { state.dimmed() };
                println!(
                    "{}  {}  {:<9} {:<10} {} ({} files, {:.2} MB)",
                    c.id.cyan(),
                    c.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    c.operation,
                    state,
                    c.description,
                    c.files_count(),
                    c.total_size_mb
                );
            }
            Ok(())
        }
        Commands::PruneBackups { days } => {
            let mut log = CheckpointLog::open(&config.undo, sink)?;
            let removed = log.cleanup_old_backups(days.unwrap_or(config.undo.retention_days))?;
            println!("{} checkpoint backups removed", removed);
            Ok(())
        }
        Commands::Feedback { kind, rejected } => {
            let mut learning = LearningStore::load(&config.learning, sink);
            let kind: ActionKind = kind.into();
            learning.record_action(kind, ActionDetails::default(), !rejected)?;
            println!("Recorded. {} confidence is now {}%", kind, learning.action_confidence(kind));
            Ok(())
        }
        Commands::Learning => {
            let learning = LearningStore::load(&config.learning, sink);
            println!("{}", learning.report());
            Ok(())
        }
        Commands::Predict { path, disks } => {
            let disks = disks
                .iter()
                .map(|d| parse_disk(d))
                .collect::<anyhow::Result<Vec<DiskUsage>>>()?;
            let files = scanner::scan_limited(&[path.clone()], &config.ignore_patterns, REPORT_FILE_LIMIT, sink.as_ref())?;
            let learning = LearningStore::load(&config.learning, sink);
            let analyzer = PredictiveAnalyzer::new(&learning, &config.cleanup.temp_extensions);

            println!("{}", analyzer.report(&files, &disks, Local::now()));
            let strategy = analyzer.predict_organization_needs(&path, &files);
            println!();
            println!("ORGANIZATION: {} ({}% confidence)", strategy.method, strategy.confidence);
            for reason in &strategy.reasoning {
                println!("   - {}", reason);
            }
            Ok(())
        }
        Commands::PrintConfig => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
    }
}

fn run_analyze(config: &AppConfig, roots: Vec<String>, personalize: bool, reporter: Arc<CliReporter>) -> anyhow::Result<()> {
    let sink: Arc<dyn EventSink> = reporter.clone();
    let rules = RulesEngine::load(&config.rules, sink.clone())?;
    let learning = personalize.then(|| LearningStore::load(&config.learning, sink.clone()));

    let request = AnalysisRequest {
        input: AnalysisInput::Scan {
            roots,
            ignore_patterns: config.ignore_patterns.clone(),
        },
        config: config.analysis.clone(),
        rules: Some(rules),
        learning,
    };

    reporter.start_spinner("Starting analysis...");
    let mut handle = spawn_analysis(request, sink);
    let outcome = loop {
        if let Some(result) = handle.try_result() {
            break result;
        }
        thread::sleep(Duration::from_millis(100));
    };
    reporter.finish();

    let outcome = outcome.context("analysis failed")?;
    println!("{}", outcome.recommendations.render());
    if outcome.recommendations.skipped > 0 {
        println!(
            "{}",
            format!(
                "{} files beyond the batch limit of {} were not analyzed",
                outcome.recommendations.skipped, config.analysis.max_batch_size
            )
            .yellow()
        );
    }
    Ok(())
}

fn run_rules(config: &AppConfig, command: RulesCommand, sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let mut engine = RulesEngine::load(&config.rules, sink.clone())?;

    match command {
        RulesCommand::List => {
            for rule in engine.rules() {
                let status = if rule.enabled { "on ".green() } else { "off".red() };
                println!(
                    "{} {} [{}] priority {} matched {} times",
                    status,
                    rule.id.cyan(),
                    rule.name,
                    rule.priority,
                    rule.match_count
                );
                for action in &rule.actions {
                    println!("      -> {}", action);
                }
            }
            let summary = engine.summary();
            println!(
                "{} rules, {} enabled, {} matches total",
                summary.total, summary.enabled, summary.total_matches
            );
            if let Some((name, count)) = summary.most_used {
                println!("Most used: {} ({} matches)", name, count);
            }
        }
        RulesCommand::Toggle { id } => {
            let enabled = engine.toggle_rule(&id)?;
            println!("{} is now {}", id, if enabled { "enabled" } else { "disabled" });
        }
        RulesCommand::Delete { id } => {
            engine.delete_rule(&id)?;
            println!("{} deleted", id);
        }
        RulesCommand::Apply { path } => {
            let files = scanner::scan_limited(&[path], &config.ignore_patterns, REPORT_FILE_LIMIT, sink.as_ref())?;
            let results = engine.apply_rules(&files, Local::now())?;
            for (file, matches) in &results {
                println!("{}", file);
                for m in matches {
                    println!("   {} ({}): {}", m.rule_name, m.rule_id.cyan(), m.action);
                }
            }
            println!("{} of {} files matched a rule", results.len(), files.len());
        }
    }
    Ok(())
}

fn print_relationships(config: &AppConfig, files: &[sentinel_core::FileRecord]) {
    let report = patterns::detect_all(
        files,
        Local::now(),
        DetectorThresholds {
            large_file_mb: config.analysis.large_file_mb,
            old_file_days: config.analysis.old_file_days,
        },
    );

    println!("{}", "FILE RELATIONSHIPS".bold());
    for cluster in &report.duplicates {
        println!("  duplicates of {}: {} files", cluster.normalized_name.cyan(), cluster.count());
    }
    for series in &report.series {
        let kind = if series.is_sequential { "sequential" } else { "with gaps" };
        println!(
            "  series {}: {} files, range {} ({})",
            series.pattern.cyan(),
            series.count(),
            series.range_label(),
            kind
        );
    }
    for pair in &report.backup_pairs {
        println!("  {} has {} backup copies", pair.original.path.cyan(), pair.backups.len());
    }
    for batch in &report.photo_batches {
        println!("  {} photos taken around {}", batch.files.len(), batch.hour.format("%Y-%m-%d %H:00"));
    }
    for project in &report.projects {
        println!(
            "  project folder {} ({}% confidence, {} files)",
            project.path.cyan(),
            project.confidence,
            project.file_count
        );
    }
    if report.naming.is_chaotic() {
        println!(
            "  mixed naming: {} camelCase, {} snake_case, {} kebab-case",
            report.naming.camel_case, report.naming.snake_case, report.naming.kebab_case
        );
    }
    println!(
        "  {} large files, {} old files, {} monthly groups",
        report.large_files.len(),
        report.old_files.len(),
        report.temporal_groups.len()
    );
}

fn print_moves(dry_run: bool, moves: &[sentinel_core::operations::PlannedMove]) {
    if !dry_run {
        return;
    }
    for m in moves {
        println!("  would move {} -> {}", m.from.display(), m.to.display());
    }
}

fn print_outcome(checkpoint_id: Option<&str>, errors: &[String]) {
    if let Some(id) = checkpoint_id {
        println!("Checkpoint {} created. Run `sentinel undo {}` to revert.", id.cyan(), id);
    }
    for e in errors {
        println!("  {} {}", "!".red(), e);
    }
}

/// `MOUNT:PERCENT:FREE_GB`. The mountpoint may itself contain colons.
fn parse_disk(raw: &str) -> anyhow::Result<DiskUsage> {
    let mut parts = raw.rsplitn(3, ':');
    let free_gb = parts.next().unwrap_or_default();
    let percent = parts.next().ok_or_else(|| anyhow!("invalid disk spec: {}", raw))?;
    let mountpoint = parts.next().ok_or_else(|| anyhow!("invalid disk spec: {}", raw))?;
    Ok(DiskUsage {
        mountpoint: mountpoint.to_string(),
        percent: percent.parse().with_context(|| format!("invalid percent in {}", raw))?,
        free_gb: free_gb.parse().with_context(|| format!("invalid free space in {}", raw))?,
    })
}

fn confirm(prompt: &str) -> io::Result<bool> {
    prompt_confirm(prompt, Some(false))
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
