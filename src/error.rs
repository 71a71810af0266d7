//! Error types for the infrastructure reconciler

use thiserror::Error;

/// Main error type for infrastructure reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error (transport, conflict, forbidden, ...)
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for owner state or desired spec
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error (including malformed provider status)
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// The extension actor reported an error in `status.lastError`
    #[error("{kind} {name} reports error: {message}")]
    Extension {
        /// Resource kind (e.g., "Infrastructure")
        kind: String,
        /// namespace/name of the resource
        name: String,
        /// Description written by the extension actor
        message: String,
        /// Machine-readable error codes
        codes: Vec<String>,
    },

    /// The resource exists but has not converged yet
    #[error("{kind} {name} is not ready yet: {reason}")]
    NotReady {
        /// Resource kind
        kind: String,
        /// namespace/name of the resource
        name: String,
        /// Why the resource is not considered ready
        reason: String,
    },

    /// The extension actor did not converge within the wait budget
    #[error("timed out waiting for {kind} {name}: {message}")]
    Timeout {
        /// Resource kind
        kind: String,
        /// namespace/name of the resource
        name: String,
        /// Diagnostic including the last observed failure, if any
        message: String,
    },

    /// A wait was canceled by the caller
    #[error("wait for {kind} {name} was canceled")]
    Canceled {
        /// Resource kind
        kind: String,
        /// namespace/name of the resource
        name: String,
    },

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a not-ready error for a resource
    pub fn not_ready(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotReady {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error, appending the last observed failure when known
    pub fn timeout(
        kind: impl Into<String>,
        name: impl Into<String>,
        last_error: Option<String>,
    ) -> Self {
        let message = match last_error {
            Some(err) => format!("last observed error: {err}"),
            None => "no error reported by the extension".to_string(),
        };
        Self::Timeout {
            kind: kind.into(),
            name: name.into(),
            message,
        }
    }

    /// Create a canceled error for a resource
    pub fn canceled(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Canceled {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Returns true if the error is a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Returns true if a later reconciliation attempt may succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube(kube::Error::Api(e)) => e.code == 409 || e.code == 429 || e.code >= 500,
            Self::Kube(_) => true,
            Self::Timeout { .. } | Self::NotReady { .. } | Self::Extension { .. } => true,
            Self::Validation(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::Canceled { .. }
            | Self::Internal(_) => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Whatever".to_string(),
            code,
        }))
    }

    #[test]
    fn timeout_carries_last_observed_error() {
        let err = Error::timeout(
            "Infrastructure",
            "shoot--dev--a/a",
            Some("quota exceeded".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("Infrastructure shoot--dev--a/a"));
        assert!(msg.contains("quota exceeded"));

        let err = Error::timeout("Infrastructure", "ns/a", None);
        assert!(err.to_string().contains("no error reported"));
    }

    #[test]
    fn timeout_and_cancel_are_distinct() {
        let timeout = Error::timeout("Infrastructure", "ns/a", None);
        let canceled = Error::canceled("Infrastructure", "ns/a");

        assert!(matches!(timeout, Error::Timeout { .. }));
        assert!(matches!(canceled, Error::Canceled { .. }));
        assert!(timeout.is_retryable());
        assert!(!canceled.is_retryable());
    }

    #[test]
    fn not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(409).is_not_found());
        assert!(!Error::validation("x").is_not_found());
    }

    #[test]
    fn api_errors_retry_on_conflict_and_server_side_failures() {
        assert!(api_error(409).is_retryable());
        assert!(api_error(429).is_retryable());
        assert!(api_error(503).is_retryable());
        assert!(!api_error(403).is_retryable());
        assert!(!api_error(422).is_retryable());
    }

    #[test]
    fn serde_errors_map_to_serialization() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_retryable());
    }
}
