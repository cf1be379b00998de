//! Error types for the daemon client.

use snapmon_core::SnapmonError;
use thiserror::Error;

/// Daemon client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was abandoned because the monitor is shutting down
    #[error("Operation cancelled")]
    Cancelled,

    /// Could not reach the daemon socket
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The daemon answered with an error response
    #[error("Daemon error ({status}): {message}")]
    Api {
        status: u16,
        kind: Option<String>,
        message: String,
    },

    /// The daemon answered with something that is not a valid response
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Client could not be configured
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] SnapmonError),
}

impl ClientError {
    /// Create an API error without a daemon error kind.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            kind: None,
            message: message.into(),
        }
    }

    /// Check if this error only means the operation was abandoned.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// Check if this error is retryable (transient daemon or socket issues).
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectionFailed(_) | ClientError::Timeout(_) => true,
            ClientError::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error is a transport-level error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionFailed(_) | ClientError::Timeout(_) | ClientError::Http(_)
        )
    }

    /// The daemon's error kind, e.g. `snap-not-found`.
    pub fn daemon_kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }

    /// Classify an HTTP status code whose body was not a daemon error.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            408 | 504 => ClientError::Timeout(0),
            502 | 503 => ClientError::ConnectionFailed(format!("daemon unavailable ({status})")),
            _ => ClientError::api(status, format!("HTTP {status}: {body}")),
        }
    }

    /// Map a transport error, keeping timeouts and connect failures distinct.
    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout_secs)
        } else if err.is_connect() {
            ClientError::ConnectionFailed(err.to_string())
        } else {
            ClientError::Http(err)
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_silent_and_not_retryable() {
        let err = ClientError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert!(!err.is_network_error());
    }

    #[test]
    fn test_connection_errors_are_retryable() {
        assert!(ClientError::ConnectionFailed("refused".into()).is_retryable());
        assert!(ClientError::Timeout(30).is_retryable());
        assert!(ClientError::Timeout(30).is_network_error());
    }

    #[test]
    fn test_api_error_kind() {
        let err = ClientError::Api {
            status: 404,
            kind: Some("snap-not-found".into()),
            message: "snap not installed".into(),
        };
        assert_eq!(err.daemon_kind(), Some("snap-not-found"));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("snap not installed"));
    }

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ClientError::from_http_status(503, ""),
            ClientError::ConnectionFailed(_)
        ));
        assert!(matches!(
            ClientError::from_http_status(408, ""),
            ClientError::Timeout(_)
        ));
        let err = ClientError::from_http_status(400, "bad request");
        assert!(matches!(err, ClientError::Api { status: 400, .. }));
        assert!(!err.is_retryable());
    }
}
