//! Policy templates and rule model
//!
//! - **template**: topic templates, bindings and condition templates
//! - **rule**: subjects, resources, working rule candidates and final records

pub mod rule;
pub mod template;

// Re-export all public types for convenience
pub use rule::{
    MergeKey, PolicyRecord, Resource, RuleCandidate, RuleIdentity, RuleOrigin, Subject,
};
pub use template::{
    normalize_topic, Binding, Bindings, ConditionTemplate, Segment, TemplateError, TopicTemplate,
};
