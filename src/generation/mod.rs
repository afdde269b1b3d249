//! Rule candidate generation
//!
//! This module turns configuration into rule candidates. Three builders share
//! one [`GenerationContext`], which fixes the order of random draws and rule
//! identifiers for a given seed.
//!
//! - **TemplateInstantiator**: expands base policies over dimensions and ranges
//! - **RestrictionRuleBuilder**: role restrictions, filtered by building suffix
//! - **CapabilityRuleBuilder**: device grants for `?true` user attributes

pub mod capability;
pub mod context;
pub mod instantiator;
pub mod restriction;

// Re-export all public types for convenience
pub use capability::CapabilityRuleBuilder;
pub use context::GenerationContext;
pub use instantiator::TemplateInstantiator;
pub use restriction::RestrictionRuleBuilder;
