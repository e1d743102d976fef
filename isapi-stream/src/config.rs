//! Configuration for the reconnect supervisor

use std::time::Duration;

use isapi_client::paths;

use crate::error::StreamError;

/// Bounds on the base reconnect delay
pub const MIN_BASE_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BASE_BACKOFF: Duration = Duration::from_secs(300);

/// Supervisor settings
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// First reconnect delay, and the delay after any productive session
    /// Default: 5 seconds
    pub base_backoff: Duration,

    /// Ceiling for the doubling reconnect delay
    /// Default: 60 seconds
    pub max_backoff: Duration,

    /// A connection with no bytes for this long is dropped
    /// Default: 90 seconds
    pub idle_timeout: Duration,

    /// Stream endpoint on the device
    pub stream_path: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(90),
            stream_path: paths::ALERT_STREAM.to_string(),
        }
    }
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.base_backoff < MIN_BASE_BACKOFF || self.base_backoff > MAX_BASE_BACKOFF {
            return Err(StreamError::Configuration(format!(
                "Reconnect delay must be between {}s and {}s, got {:?}",
                MIN_BASE_BACKOFF.as_secs(),
                MAX_BASE_BACKOFF.as_secs(),
                self.base_backoff
            )));
        }

        if self.max_backoff < self.base_backoff {
            return Err(StreamError::Configuration(
                "Maximum backoff must not be below the reconnect delay".to_string(),
            ));
        }

        if self.idle_timeout == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Idle timeout must be greater than 0".to_string(),
            ));
        }

        if !self.stream_path.starts_with('/') {
            return Err(StreamError::Configuration(format!(
                "Stream path must be absolute: {}",
                self.stream_path
            )));
        }

        Ok(())
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }
}
