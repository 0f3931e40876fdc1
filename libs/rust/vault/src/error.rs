//! Vault error types using thiserror 2.0.
//!
//! Backend failures are classified by the status code the secret backend
//! answered with, so the lease and token state machines can tell an
//! invalidated credential (recoverable) from a fatal error (propagated).

use std::time::Duration;
use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Vault server unavailable (transport failure or 5xx)
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Authentication could not be attempted
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Backend rejected the request as malformed (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Permission denied (403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Secret not found (404)
    #[error("Secret not found at path: {0}")]
    SecretNotFound(String),

    /// Rate limited (429)
    #[error("Rate limited")]
    RateLimited,

    /// Any other non-success status
    #[error("Vault returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// A wrapping token could not be unwrapped
    #[error(
        "wrapping token is not valid or does not exist for {target}; \
         the token has either expired, already been unwrapped by this application \
         (an earlier successful unwrap returned the value), or been unwrapped by \
         someone else (a stolen token): {reason}"
    )]
    InvalidWrappingToken {
        /// What the wrapped payload was expected to be
        target: String,
        /// Backend response
        reason: String,
    },

    /// The unwrap gate could not be acquired in time
    #[error("Timed out after {0:?} waiting to unwrap a wrapping token")]
    UnwrapGateTimeout(Duration),

    /// Credentials provider name is not configured
    #[error("Unknown credentials provider: {0}")]
    UnknownProvider(String),

    /// Credentials provider has no usable resolution strategy
    #[error("Misconfigured credentials provider: {0}")]
    MisconfiguredProvider(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Status code of a backend error, if the error came from the backend.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::PermissionDenied(_) => Some(403),
            Self::SecretNotFound(_) => Some(404),
            Self::RateLimited => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 403 answer.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// True for a 400 answer.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_) | Self::UnwrapGateTimeout(_)
        )
    }

    /// Map a non-success status code and body onto an error.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::BadRequest(message),
            403 => Self::PermissionDenied(message),
            404 => Self::SecretNotFound(message),
            429 => Self::RateLimited,
            s if s >= 500 => Self::Unavailable(format!("Status {s}: {message}")),
            _ => Self::Status { status, message },
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a secret not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::SecretNotFound(path.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Vault unavailable: connection refused");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VaultError::Unavailable("timeout".to_string()).is_retryable());
        assert!(VaultError::RateLimited.is_retryable());
        assert!(!VaultError::SecretNotFound("path".to_string()).is_retryable());
        assert!(!VaultError::UnknownProvider("db".to_string()).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        assert!(VaultError::from_status(400, "bad").is_bad_request());
        assert!(VaultError::from_status(403, "denied").is_forbidden());
        assert!(matches!(
            VaultError::from_status(404, "missing"),
            VaultError::SecretNotFound(_)
        ));
        assert!(matches!(
            VaultError::from_status(503, "sealed"),
            VaultError::Unavailable(_)
        ));
        assert_eq!(VaultError::from_status(412, "x").status(), Some(412));
        assert_eq!(VaultError::RateLimited.status(), Some(429));
        assert_eq!(VaultError::unavailable("down").status(), None);
    }

    #[test]
    fn test_invalid_wrapping_token_names_causes() {
        let err = VaultError::InvalidWrappingToken {
            target: "app role secret id".to_string(),
            reason: "wrapping token is not valid or does not exist".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expired"));
        assert!(msg.contains("already been unwrapped"));
        assert!(msg.contains("stolen"));
    }
}
