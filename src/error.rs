//! Error types for the TeamCity provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while driving a resource lifecycle.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found on the server.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A parameter block tried to redefine a parameter the parent project owns.
    #[error("Can't redefine parent parameter {0}")]
    ParentParameterRedefined(String),

    /// The provider is missing configuration or has not been configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("TeamCity API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Operation not supported for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A multi-step apply failed after some steps already took effect.
    ///
    /// `state` describes what was applied and should be persisted so the next
    /// apply converges from there.
    #[error("{source}")]
    PartialApply {
        /// State reflecting the steps that succeeded.
        state: Box<serde_json::Value>,
        /// The failure that stopped the apply.
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::ParentParameterRedefined(_) => self.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::PartialApply { source, .. } => source.message(),
        }
    }

    /// Attach the state applied so far. Errors that already carry a partial
    /// state keep the earlier one.
    pub fn with_partial_state(self, state: serde_json::Value) -> Self {
        match self {
            Self::PartialApply { .. } => self,
            other => Self::PartialApply {
                state: Box::new(state),
                source: Box::new(other),
            },
        }
    }

    /// The partially applied state, if any.
    pub fn partial_state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::PartialApply { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Whether the server reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            Self::PartialApply { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Convert into an error diagnostic for the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string());
        match self {
            Self::ParentParameterRedefined(_) => diagnostic.with_attribute("parameter"),
            _ => diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("project Foo".to_string());
        assert_eq!(format!("{}", err), "Resource not found: project Foo");

        let err = ProviderError::ParentParameterRedefined("env.A".to_string());
        assert_eq!(format!("{}", err), "Can't redefine parent parameter env.A");

        let err = ProviderError::Api {
            status: 409,
            message: "Project with this ID already exists".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "TeamCity API error (409): Project with this ID already exists"
        );
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("missing address".to_string());
        assert_eq!(err.message(), "missing address");

        let err = ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_partial_state_wraps_once() {
        let err = ProviderError::NotFound("x".to_string())
            .with_partial_state(json!({"id": "A"}))
            .with_partial_state(json!({"id": "B"}));

        assert_eq!(err.partial_state(), Some(&json!({"id": "A"})));
        assert_eq!(err.to_string(), "Resource not found: x");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_is_not_found() {
        assert!(ProviderError::Api {
            status: 404,
            message: String::new()
        }
        .is_not_found());
        assert!(!ProviderError::InvalidRequest("x".to_string()).is_not_found());
    }

    #[test]
    fn test_to_diagnostic() {
        let diagnostic = ProviderError::ParentParameterRedefined("A".to_string()).to_diagnostic();
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.summary, "Can't redefine parent parameter A");
        assert_eq!(diagnostic.attribute, Some("parameter".to_string()));

        let diagnostic = ProviderError::Unimplemented("import".to_string()).to_diagnostic();
        assert_eq!(diagnostic.attribute, None);
    }
}
