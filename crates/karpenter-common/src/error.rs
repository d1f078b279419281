//! Error types for the Karpenter construct
//!
//! Errors are structured with fields to aid debugging. Each variant carries
//! the provisioner (policy) name or the collaborator context it came from.
//! Nothing here is retried internally: every error is returned to the caller
//! of the operation that produced it.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for construct operations
#[derive(Debug, Error)]
pub enum Error {
    /// Options that cannot be combined, or a feature the controller version lacks
    #[error("configuration error for {policy}: {message}")]
    Configuration {
        /// Name of the provisioner being built
        policy: String,
        /// Description of the conflict
        message: String,
    },

    /// Malformed input (names, identifiers, enum strings, versions)
    #[error("validation error for {policy}: {message}")]
    Validation {
        /// Name of the provisioner (or construct) with invalid input
        policy: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "requirements.instanceTypes")
        field: Option<String>,
    },

    /// Failure reported by an external collaborator (engine, installer, tagger)
    #[error("engine error [{context}]: {message}")]
    Engine {
        /// Collaborator that failed (e.g., "cluster", "identity", "chart")
        context: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being serialized (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create a configuration error without policy context
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            policy: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a configuration error for a named provisioner
    pub fn configuration_for(policy: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            policy: policy.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    ///
    /// For simple validation errors without policy context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            policy: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with policy context
    pub fn validation_for(policy: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            policy: policy.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with policy context and field path
    pub fn validation_for_field(
        policy: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            policy: policy.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an engine error with the given message
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            context: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create an engine error naming the collaborator that failed
    pub fn engine_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Engine {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with document kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration, validation, and serialization errors need an input fix.
    /// Engine errors come from outside the construct and may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Engine { .. })
    }

    /// Get the provisioner name if this error is tied to one
    pub fn policy(&self) -> Option<&str> {
        match self {
            Error::Configuration { policy, .. } => Some(policy),
            Error::Validation { policy, .. } => Some(policy),
            Error::Engine { .. } => None,
            Error::Serialization { .. } => None,
        }
    }

    /// Get the collaborator context if this is an engine error
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Engine { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Returns true for errors raised by the mutual-exclusion and version checks
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true for malformed-input errors
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: Error Propagation while Declaring Provisioners
    // ==========================================================================

    /// Story: conflicting scale-down options are rejected before anything is built
    #[test]
    fn story_configuration_error_names_the_provisioner() {
        let err = Error::configuration_for(
            "batch",
            "consolidation cannot be combined with ttlSecondsAfterEmpty",
        );
        assert!(err.to_string().contains("configuration error for batch"));
        assert!(err.to_string().contains("ttlSecondsAfterEmpty"));
        assert_eq!(err.policy(), Some("batch"));
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
    }

    /// Story: malformed names point at the offending field
    #[test]
    fn story_validation_error_with_field_path() {
        let err = Error::validation_for_field("Default_1", "name", "must be lowercase");
        match &err {
            Error::Validation { field, policy, .. } => {
                assert_eq!(field.as_deref(), Some("name"));
                assert_eq!(policy, "Default_1");
            }
            _ => panic!("Expected Validation variant"),
        }
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    /// Story: collaborator failures carry their context and may be retried by the caller
    #[test]
    fn story_engine_errors_surface_collaborator_context() {
        let err = Error::engine_with_context("chart", "release already exists");
        assert!(err.to_string().contains("[chart]"));
        assert_eq!(err.context(), Some("chart"));
        assert!(err.is_retryable());
        assert_eq!(err.policy(), None);

        let err = Error::engine("timeout");
        assert_eq!(err.context(), Some(UNKNOWN_CONTEXT));
    }

    #[test]
    fn serialization_error_keeps_kind() {
        let err = Error::serialization_for_kind("Provisioner", "key must be a string");
        match &err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("Provisioner")),
            _ => panic!("Expected Serialization variant"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn default_constructors_use_unknown_context() {
        assert_eq!(Error::validation("x").policy(), Some(UNKNOWN_CONTEXT));
        assert_eq!(Error::configuration("x").policy(), Some(UNKNOWN_CONTEXT));
    }

    #[test]
    fn serde_json_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
