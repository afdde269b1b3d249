//! Dimension catalog and user directory
//!
//! This module holds the resolved inputs of a generation run: the physical
//! dimensions templates are expanded over, and the users with their attributes.
//!
//! # Overview
//!
//! - **DimensionValue / Dimension**: a labelled value of one dimension
//! - **DimensionCatalog**: buildings, floors, rooms and device types
//! - **User / UserAttribute**: configured users and their attribute rows
//! - **UserDirectory**: role and capability lookups over the users
//!
//! # Usage Example
//!
//! ```rust
//! use abac_policy_generator::catalog::*;
//! use abac_policy_generator::types::*;
//!
//! let config = PolicyConfig::default();
//! let catalog = DimensionCatalog::from_expansions(&config.expansions);
//! assert_eq!(catalog.dimension(DimensionKind::Building).len(), 2);
//!
//! let directory = UserDirectory::new(config.users.clone(), config.user_attributes.clone());
//! assert!(directory.roles_of(UserId(1)).any(|role| role == "intern"));
//! ```

pub mod dimension;
pub mod registry;
pub mod user;

// Re-export all public types for convenience
pub use dimension::{Dimension, DimensionValue};
pub use registry::DimensionCatalog;
pub use user::{User, UserAttribute, UserDirectory};
