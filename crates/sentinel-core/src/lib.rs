pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod learning;
pub mod model;
pub mod operations;
pub mod patterns;
mod persist;
pub mod platform;
pub mod predict;
pub mod recommend;
pub mod rules;
pub mod scanner;
pub mod undo;
pub mod worker;

pub use classifier::{classify, Category, Classification, Priority};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use events::{EventCategory, EventSink, SilentSink, TracingSink};
pub use learning::{ActionDetails, LearningStore};
pub use model::FileRecord;
pub use operations::Operations;
pub use predict::{DiskUsage, PredictiveAnalyzer};
pub use recommend::{Action, ActionKind, Recommendations, Recommender};
pub use rules::RulesEngine;
pub use undo::CheckpointLog;
pub use worker::{spawn_analysis, AnalysisHandle, AnalysisInput, AnalysisRequest};
