//! Error types for the ISAPI client

use thiserror::Error;

/// Errors that can occur while talking to a recorder
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, TLS or body transfer failure
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The request did not complete within its deadline
    #[error("Request timed out")]
    Timeout,

    /// Credentials were rejected even after answering a fresh challenge
    #[error("Authentication rejected by device")]
    Unauthorized,

    /// The event stream answered with something other than 200
    #[error("Unexpected HTTP status {status}: {excerpt}")]
    UnexpectedStatus {
        status: u16,
        /// First 200 characters of the response body
        excerpt: String,
    },

    /// Host, port or path do not form a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(error.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(error: url::ParseError) -> Self {
        ClientError::InvalidUrl(error.to_string())
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let error = ClientError::UnexpectedStatus {
            status: 403,
            excerpt: "<ResponseStatus>".to_string(),
        };
        assert_eq!(error.to_string(), "Unexpected HTTP status 403: <ResponseStatus>");

        let error: ClientError = url::ParseError::EmptyHost.into();
        assert!(matches!(error, ClientError::InvalidUrl(_)));
    }
}
