//! Core types and identifiers for the policy generator
//!
//! This module contains fundamental types, identifiers, and configuration structures
//! used throughout the generation pipeline.
//!
//! # Overview
//!
//! - **Identifiers**: sequential rule identifiers and configured user identifiers
//! - **Enums**: effects, actions, hints, dimensions and generalization strategies
//! - **Configuration**: generation configuration with validation and CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use abac_policy_generator::types::*;
//!
//! let config = PolicyConfig {
//!     max_policies: 50,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//!
//! assert_eq!(Effect::Grant.most_restrictive(Effect::Deny), Effect::Deny);
//! assert_eq!(RuleId(7).to_string(), "RULE_000007");
//! ```

pub mod config;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use enums::*;
pub use identifiers::*;
