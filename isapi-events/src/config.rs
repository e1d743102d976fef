//! Session configuration
//!
//! One [`SessionConfig`] describes one recorder. It deserializes from any
//! serde format with every field optional, is checked once by
//! [`SessionConfig::validate`] and then split into the per-crate settings.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use channel_state::{
    validate_overrides, RegistryConfig, TimeoutOverrides, DEFAULT_EVENT_TYPE, MAX_TIMEOUT_SECS,
    MIN_TIMEOUT_SECS,
};
use isapi_client::ClientConfig;
use isapi_stream::{SupervisorConfig, MAX_BASE_BACKOFF, MIN_BASE_BACKOFF};

use crate::error::ConfigError;

/// Settings for one recorder
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,

    /// Default: 80
    pub port: u16,

    pub use_ssl: bool,

    /// Certificate verification. Follows `use_ssl` when unset.
    pub verify_tls: Option<bool>,

    pub username: String,

    pub password: String,

    /// Hold time before flags drop without an `inactive` event
    /// Default: 30 seconds, allowed 0..=1800
    pub default_off_delay_secs: i64,

    /// First reconnect delay
    /// Default: 5 seconds, allowed 1..=300
    pub reconnect_delay_secs: u64,

    /// Ceiling for the doubling reconnect delay
    /// Default: 60 seconds
    pub max_backoff_secs: u64,

    /// Stream connections silent for this long are dropped
    /// Default: 90 seconds
    pub idle_read_timeout_secs: u64,

    /// Event types that drive channel state
    /// Default: `["VMD"]`
    pub accepted_event_types: Vec<String>,

    /// Per-channel hold times as `channel=seconds` lines, migrated into the
    /// timeout store on first start
    pub legacy_overrides: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 80,
            use_ssl: false,
            verify_tls: None,
            username: String::new(),
            password: String::new(),
            default_off_delay_secs: 30,
            reconnect_delay_secs: 5,
            max_backoff_secs: 60,
            idle_read_timeout_secs: 90,
            accepted_event_types: vec![DEFAULT_EVENT_TYPE.to_string()],
            legacy_overrides: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("verify_tls", &self.verify_tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("default_off_delay_secs", &self.default_off_delay_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_backoff_secs", &self.max_backoff_secs)
            .field("idle_read_timeout_secs", &self.idle_read_timeout_secs)
            .field("accepted_event_types", &self.accepted_event_types)
            .field("legacy_overrides", &self.legacy_overrides)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    pub fn with_off_delay(mut self, secs: i64) -> Self {
        self.default_off_delay_secs = secs;
        self
    }

    pub fn with_backoff(mut self, base_secs: u64, max_secs: u64) -> Self {
        self.reconnect_delay_secs = base_secs;
        self.max_backoff_secs = max_secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_read_timeout_secs = secs;
        self
    }

    pub fn with_event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_event_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_legacy_overrides(mut self, text: impl Into<String>) -> Self {
        self.legacy_overrides = Some(text.into());
        self
    }

    /// Check every field; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingUsername);
        }

        let off_delay_range = MIN_TIMEOUT_SECS as i64..=MAX_TIMEOUT_SECS as i64;
        if !off_delay_range.contains(&self.default_off_delay_secs) {
            return Err(ConfigError::OffDelayOutOfRange {
                value: self.default_off_delay_secs,
                min: MIN_TIMEOUT_SECS,
                max: MAX_TIMEOUT_SECS,
            });
        }

        let (min, max) = (MIN_BASE_BACKOFF.as_secs(), MAX_BASE_BACKOFF.as_secs());
        if !(min..=max).contains(&self.reconnect_delay_secs) {
            return Err(ConfigError::ReconnectDelayOutOfRange {
                value: self.reconnect_delay_secs,
                min,
                max,
            });
        }

        if self.max_backoff_secs < self.reconnect_delay_secs {
            return Err(ConfigError::BackoffBelowBase {
                base: self.reconnect_delay_secs,
                max: self.max_backoff_secs,
            });
        }

        if self.idle_read_timeout_secs == 0 {
            return Err(ConfigError::InvalidIdleTimeout);
        }

        if self.accepted_event_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::NoEventTypes);
        }

        if let Some(text) = &self.legacy_overrides {
            validate_overrides(text)?;
        }

        Ok(())
    }

    /// Key identifying this recorder in a timeout store
    pub fn session_key(&self) -> String {
        let host: String = self
            .host
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}", host, self.port)
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.host.trim(), &self.username, &self.password)
            .with_port(self.port)
            .with_ssl(self.use_ssl);
        if let Some(verify) = self.verify_tls {
            config = config.with_verify_tls(verify);
        }
        config
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::new()
            .with_backoff(
                Duration::from_secs(self.reconnect_delay_secs),
                Duration::from_secs(self.max_backoff_secs),
            )
            .with_idle_timeout(Duration::from_secs(self.idle_read_timeout_secs))
    }

    pub fn registry_config(&self, overrides: TimeoutOverrides) -> RegistryConfig {
        RegistryConfig {
            default_timeout_secs: self.default_off_delay_secs,
            overrides,
            accepted_event_types: self
                .accepted_event_types
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}
