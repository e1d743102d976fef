//! Error types for the isapi-stream crate.

use std::time::Duration;

use isapi_client::ClientError;

/// Reasons a stream connection ended or could not start.
///
/// Every variant except [`StreamError::Configuration`] is recoverable: the
/// supervisor logs it, backs off and reconnects.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Opening or reading the stream failed at the HTTP layer
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// No bytes arrived within the idle window
    #[error("No data received for {0:?}")]
    IdleTimeout(Duration),

    /// The device ended the response body
    #[error("Device closed the event stream")]
    Closed,

    /// Invalid supervisor configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The supervisor task panicked or was aborted
    #[error("Supervisor task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;
