//! Error types and handling
//!
//! This module contains the error type returned by the generation pipeline.

use crate::policy::TemplateError;
use crate::types::{ConfigError, ConfigValidationError};
use thiserror::Error;

/// Errors that can occur during policy generation
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Configuration could not be loaded
    #[error("Configuration loading failed: {0}")]
    ConfigurationLoad(#[from] ConfigError),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigurationInvalid(#[from] ConfigValidationError),

    /// A template could not be parsed or rendered
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Writing the policy set failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Whether the error is a configuration defect (fix the input, not the run)
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            GenerationError::ConfigurationLoad(_)
                | GenerationError::ConfigurationInvalid(_)
                | GenerationError::Template(_)
        )
    }

    /// Whether a later run can succeed without changing the configuration
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GenerationError::Io(_))
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::ConfigurationLoad(_) => "Configuration",
            GenerationError::ConfigurationInvalid(_) => "Validation",
            GenerationError::Template(_) => "Template",
            GenerationError::Io(_) => "IO",
        }
    }
}

/// Result type for generation operations
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = GenerationError::from(ConfigValidationError::InvalidMaxPolicies(0));
        assert_eq!(err.category(), "Validation");
        assert!(err.is_configuration_defect());
        assert!(err.to_string().contains("max_policies"));

        assert!(!err.is_recoverable());

        let err = GenerationError::from(crate::policy::TopicTemplate::parse("{x}").unwrap_err());
        assert_eq!(err.category(), "Template");
        assert!(err.is_configuration_defect());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: GenerationError = io.into();
        assert!(matches!(err, GenerationError::Io(_)));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("read-only"));
    }
}
