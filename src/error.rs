//! Error types for cfddns.

use thiserror::Error;

/// Result type alias for cfddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error (timeout, connection failure, unreadable response).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider refused the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider-specific error.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// IP detection error.
    #[error("IP detection failed: {0}")]
    IpDetection(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DdnsError {
    /// Whether the error came from the transport rather than from an answer
    /// the provider actually gave.
    pub fn is_transport(&self) -> bool {
        matches!(self, DdnsError::Network(_))
    }

    /// Whether the provider answered, but with a payload that could not be
    /// used.
    pub fn is_payload(&self) -> bool {
        matches!(self, DdnsError::Provider { .. })
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(DdnsError::Network("timed out".into()).is_transport());
        assert!(!DdnsError::Auth("bad key".into()).is_transport());

        let payload = DdnsError::Provider {
            provider: "cloudflare".into(),
            message: "unreadable zone listing (HTTP 200 OK)".into(),
        };
        assert!(payload.is_payload());
        assert!(!payload.is_transport());
    }

    #[test]
    fn test_auth_message() {
        let err = DdnsError::Auth("Invalid request headers".into());
        assert_eq!(
            err.to_string(),
            "Authentication failed: Invalid request headers"
        );
    }
}
