//! Error types for the HTTP clients.

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by [`ApiClient`](crate::ApiClient).
///
/// The validation client never returns these; it folds them into a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out\n\nSuggestion: Raise http.requestTimeoutSeconds in academy.json or check the service load")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The service could not be reached.
    #[error("request to {url} failed: {message}\n\nSuggestion: Check that the service is running and apiUrl is correct")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying error.
        message: String,
    },

    /// The service answered with a non-2xx status.
    #[error("{url} returned HTTP {status}: {detail}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// `detail` from the body, or `HTTP <status>`.
        detail: String,
    },

    /// The body could not be decoded.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Requested URL.
        url: String,
        /// Decoding error.
        message: String,
    },
}

impl ClientError {
    /// Classifies a `reqwest` error for `url`.
    #[must_use]
    pub fn from_reqwest(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_decode() {
            Self::InvalidResponse {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                url,
                message: err.to_string(),
            }
        }
    }

    /// Returns `true` for a 404 status.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Build(_) | Self::InvalidResponse { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = ClientError::Status {
            url: "http://x/api/modules/99-missing".into(),
            status: 404,
            detail: "Module not found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Module not found"));

        let err = ClientError::Status {
            url: "http://x".into(),
            status: 503,
            detail: "HTTP 503".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_has_suggestion() {
        let err = ClientError::Timeout {
            url: "http://x".into(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Suggestion"));
    }
}
