//! Rule set optimization
//!
//! - **dedup**: removes exact duplicates, keeping the highest priority
//! - **generalizer**: fits the rule set under `max_policies` by widening and merging
//! - **ranker**: orders rules for evaluation and freezes them into records

pub mod dedup;
pub mod generalizer;
pub mod ranker;

// Re-export all public types for convenience
pub use dedup::deduplicate;
pub use generalizer::{GeneralizationReport, Generalizer, GroupAllocation, RuleGroup};
pub use ranker::{compare_rules, rank};
