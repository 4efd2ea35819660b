//! Background analysis.
//!
//! The worker owns the rules engine and learning store for the duration of
//! the job and hands them back with the result. Cancellation is cooperative:
//! the token is checked between scan, rule evaluation and recommendation.

use chrono::Local;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::learning::LearningStore;
use crate::model::FileRecord;
use crate::recommend::{Recommendations, Recommender};
use crate::rules::RulesEngine;
use crate::scanner;

/// Where the files to analyze come from.
pub enum AnalysisInput {
    Scan {
        roots: Vec<String>,
        ignore_patterns: Vec<String>,
    },
    Files(Vec<FileRecord>),
}

pub struct AnalysisRequest {
    pub input: AnalysisInput,
    pub config: AnalysisConfig,
    pub rules: Option<RulesEngine>,
    pub learning: Option<LearningStore>,
}

pub struct AnalysisOutcome {
    pub recommendations: Recommendations,
    pub rules: Option<RulesEngine>,
    pub learning: Option<LearningStore>,
}

pub struct AnalysisHandle {
    receiver: Receiver<Result<AnalysisOutcome>>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AnalysisHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll. `None` while the job is still running.
    pub fn try_result(&mut self) -> Option<Result<AnalysisOutcome>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(Error::WorkerGone))
            }
        }
    }

    /// Block until the job finishes.
    pub fn wait(mut self) -> Result<AnalysisOutcome> {
        let result = self.receiver.recv().unwrap_or(Err(Error::WorkerGone));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Analysis worker panicked");
            }
        }
    }
}

fn check(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn run(mut request: AnalysisRequest, cancel: &AtomicBool, sink: &dyn EventSink) -> Result<AnalysisOutcome> {
    let files = match request.input {
        AnalysisInput::Scan {
            ref roots,
            ref ignore_patterns,
        } => scanner::scan(roots, ignore_patterns, sink)?,
        AnalysisInput::Files(ref mut files) => std::mem::take(files),
    };
    check(cancel)?;

    let now = Local::now();
    let bound = request.config.max_batch_size.min(files.len());
    let rule_matches = match request.rules.as_mut() {
        Some(engine) => engine.apply_rules(&files[..bound], now)?,
        None => BTreeMap::new(),
    };
    check(cancel)?;

    let mut recommender = Recommender::new(&request.config).with_rule_matches(&rule_matches);
    if let Some(learning) = request.learning.as_ref() {
        recommender = recommender.with_learning(learning);
    }
    let recommendations = recommender.generate(&files, now);
    debug!(
        "Analysis produced {} actions and {} insights",
        recommendations.actions.len(),
        recommendations.insights.len()
    );

    Ok(AnalysisOutcome {
        recommendations,
        rules: request.rules,
        learning: request.learning,
    })
}

/// Run an analysis on a background thread.
pub fn spawn_analysis(request: AnalysisRequest, sink: Arc<dyn EventSink>) -> AnalysisHandle {
    let (sender, receiver) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let token = Arc::clone(&cancel);

    let thread = thread::spawn(move || {
        let result = run(request, &token, sink.as_ref());
        if let Err(Error::Cancelled) = &result {
            info!("Analysis cancelled");
        }
        // receiver dropped means nobody is waiting
        let _ = sender.send(result);
    });

    AnalysisHandle {
        receiver,
        cancel,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SilentSink;

    fn request(files: Vec<FileRecord>) -> AnalysisRequest {
        AnalysisRequest {
            input: AnalysisInput::Files(files),
            config: AnalysisConfig::default(),
            rules: None,
            learning: None,
        }
    }

    #[test]
    fn test_worker_returns_recommendations() {
        let files = vec![FileRecord::new("/d/a.tmp", 1024, None)];
        let outcome = spawn_analysis(request(files), Arc::new(SilentSink)).wait().unwrap();
        assert_eq!(outcome.recommendations.total_files, 1);
        assert_eq!(outcome.recommendations.actions[0].confidence, 95);
    }

    #[test]
    fn test_cancel_before_start_is_reported() {
        let cancel = AtomicBool::new(true);
        let result = run(request(Vec::new()), &cancel, &SilentSink);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
