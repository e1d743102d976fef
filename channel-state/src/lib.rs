//! Debounced per-channel sensor state for ISAPI alerts.
//!
//! Recorders only report transitions: a channel "became active" or "became
//! inactive". The [`ChannelRegistry`] turns those into stable boolean motion,
//! human and vehicle signals. An `active` alert raises the flags and arms a
//! single-shot auto-off timer with the channel's timeout; `inactive` or the
//! timer firing lowers them again.
//!
//! # Example
//!
//! ```rust,ignore
//! use channel_state::{ChannelRegistry, RegistryConfig};
//!
//! let registry = ChannelRegistry::new(RegistryConfig::default());
//! let _handle = registry.add_state_listener(|state| {
//!     println!("ch{} motion={} human={}", state.channel_id, state.motion, state.human);
//! });
//!
//! // Feed decoded alerts from the stream
//! registry.process_event(&event);
//! ```

pub mod error;
mod listener;
pub mod registry;
pub mod state;
pub mod store;
pub mod timeouts;

pub use error::{OverrideError, StoreError};
pub use listener::ListenerHandle;
pub use registry::{ChannelRegistry, RegistryConfig, DEFAULT_EVENT_TYPE};
pub use state::{ChannelState, SensorKind};
pub use store::{JsonFileTimeoutStore, MemoryTimeoutStore, TimeoutStore};
pub use timeouts::{
    clamp_timeout, parse_overrides, validate_overrides, TimeoutConfig, TimeoutOverrides,
    MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
