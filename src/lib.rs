//! ABAC Policy Generator
//!
//! Generates synthetic attribute-based access control (ABAC) rule sets for an
//! MQTT-style topic space of buildings, floors, rooms and device types.
//!
//! # Overview
//!
//! Base policy templates are expanded across the configured dimensions, role
//! restrictions and capability grants are added, exact duplicates are removed,
//! and the result is generalized until it fits under a maximum rule count.
//! The surviving rules are ranked for evaluation and written, together with
//! the users they apply to, as a SQL script or as JSON lines.
//!
//! ## Key Features
//!
//! - **Template Expansion**: cross products over dimensions and value ranges
//! - **Role Restrictions**: building-suffix scoped rules with priority bonuses
//! - **Capability Grants**: device access for `?true` user attributes
//! - **Bounded Output**: widening and merging under a slot budget per group
//! - **Deterministic Runs**: one seeded random source per run
//!
//! ## Quick Start
//!
//! ```rust
//! use abac_policy_generator::*;
//!
//! let config = PolicyConfig {
//!     max_policies: 40,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let orchestrator = PolicyOrchestrator::new(config)?;
//! let outcome = orchestrator.generate()?;
//! assert!(outcome.policy_set.rules.len() <= 40);
//!
//! let mut sql = Vec::new();
//! output::write_sql(&outcome.policy_set, &mut sql)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: Core types, identifiers, and configuration
//! - [`catalog`]: Dimension values and the user directory
//! - [`policy`]: Topic templates and the rule model
//! - [`generation`]: Template, restriction and capability rule builders
//! - [`optimization`]: Deduplication, generalization and ranking
//! - [`engine`]: Pipeline orchestration, statistics, errors and logging
//! - [`output`]: SQL and JSON lines emitters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ Instantiate │    │  Restrict   │    │ Capabilities │    │             │
//! │  templates  ├───►│   roles     ├───►│   grants     ├───►│ Deduplicate │
//! └─────────────┘    └─────────────┘    └──────────────┘    └──────┬──────┘
//!                                                                  │
//! ┌─────────────┐    ┌─────────────┐    ┌──────────────┐           │
//! │    Emit     │◄───┤    Rank     │◄───┤  Generalize  │◄──────────┘
//! │ SQL / JSON  │    │             │    │ (+ re-dedup) │
//! └─────────────┘    └─────────────┘    └──────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod catalog;
pub mod engine;
pub mod generation;
pub mod optimization;
pub mod output;
pub mod policy;
pub mod types;

// Re-export commonly used types

// Core types and identifiers
pub use types::{
    Action, CliArgs, ConfigError, ConfigValidationError, DimensionKind, DistributionStrategy,
    Effect, GroupingKey, Hint, HintSet, OutputFormat, PolicyConfig, RuleId, UserId,
};

// Catalog and rule model
pub use catalog::{DimensionCatalog, User, UserAttribute, UserDirectory};
pub use policy::{PolicyRecord, Resource, RuleCandidate, Subject, TemplateError, TopicTemplate};

// Pipeline
pub use engine::{
    GenerationError, GenerationOutcome, GenerationResult, GenerationStatistics, LoggingConfig,
    PolicyOrchestrator, PolicySet,
};
pub use generation::GenerationContext;
pub use optimization::{GeneralizationReport, Generalizer};
