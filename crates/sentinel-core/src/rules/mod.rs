pub mod condition;
pub mod engine;

pub use condition::{evaluate, Comparison, Condition};
pub use engine::{CustomRule, NewRule, RuleAction, RuleMatch, RuleUpdate, RulesEngine, RulesSummary};
