//! Pipeline orchestration and run support
//!
//! This module contains the pipeline orchestrator, run statistics, error
//! handling, and logging setup.
//!
//! # Overview
//!
//! - **PolicyOrchestrator**: validates configuration and runs every stage
//! - **GenerationStatistics**: counts collected during a run
//! - **GenerationError**: errors surfaced by the pipeline
//! - **LoggingConfig**: tracing subscriber setup
//!
//! # Usage Example
//!
//! ```rust
//! use abac_policy_generator::engine::*;
//! use abac_policy_generator::types::*;
//!
//! let config = PolicyConfig {
//!     max_policies: 25,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let orchestrator = PolicyOrchestrator::new(config).unwrap();
//! let outcome = orchestrator.generate().unwrap();
//! assert!(outcome.policy_set.rules.len() <= 25);
//! println!("{}", outcome.statistics.generate_compact_summary());
//! ```

pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod statistics;

// Re-export all public types for convenience
pub use error::*;
pub use logging::*;
pub use orchestrator::*;
pub use statistics::*;
