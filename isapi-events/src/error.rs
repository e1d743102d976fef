use thiserror::Error;

use channel_state::{OverrideError, StoreError};
use isapi_client::ClientError;
use isapi_stream::StreamError;

/// Rejected session settings. Never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Host must not be empty")]
    MissingHost,

    #[error("Port must be greater than 0")]
    InvalidPort,

    #[error("Username must not be empty")]
    MissingUsername,

    #[error("Off delay must be between {min} and {max} seconds, got {value}")]
    OffDelayOutOfRange { value: i64, min: u32, max: u32 },

    #[error("Reconnect delay must be between {min} and {max} seconds, got {value}")]
    ReconnectDelayOutOfRange { value: u64, min: u64, max: u64 },

    #[error("Maximum backoff ({max}s) is below the reconnect delay ({base}s)")]
    BackoffBelowBase { base: u64, max: u64 },

    #[error("Idle read timeout must be greater than 0")]
    InvalidIdleTimeout,

    #[error("At least one event type must be accepted")]
    NoEventTypes,

    #[error("Invalid channel timeout override: {0}")]
    InvalidOverride(#[from] OverrideError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Cannot connect to device: {0}")]
    CannotConnect(String),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Timeout store error: {0}")]
    Store(#[from] StoreError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
