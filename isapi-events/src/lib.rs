//! # isapi-events
//!
//! Bridges a Hikvision recorder's ISAPI `alertStream` into debounced
//! per-channel motion, human and vehicle state.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use isapi_events::{EventSession, JsonFileTimeoutStore, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), isapi_events::SessionError> {
//!     let config = SessionConfig::new("192.168.1.64", "admin", "password");
//!     EventSession::validate(&config).await?;
//!
//!     let store = Arc::new(JsonFileTimeoutStore::for_session(".", &config.session_key()));
//!     let session = EventSession::start(config, store).await?;
//!
//!     let _listener = session.registry().add_state_listener(|state| {
//!         println!(
//!             "channel {}: motion={} human={} vehicle={}",
//!             state.channel_id, state.motion, state.human, state.vehicle
//!         );
//!     });
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     session.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! isapi-events   (session setup, config, logging)
//!     ↓
//! isapi-stream   (reconnect supervisor)
//!     ↓
//! isapi-client   (digest auth, requests)    channel-state (registry, timers, overrides)
//!     ↓                                          ↓
//! isapi-parser   (document extraction, XML decoding)
//! ```

mod config;
pub mod discovery;
mod error;
pub mod logging;
mod session;

pub use config::SessionConfig;
pub use error::{ConfigError, Result, SessionError};
pub use session::EventSession;

pub use channel_state::{
    ChannelRegistry, ChannelState, JsonFileTimeoutStore, ListenerHandle, MemoryTimeoutStore,
    SensorKind, StoreError, TimeoutOverrides, TimeoutStore,
};
pub use isapi_parser::{ChannelId, DeviceInfo, EventRecord, EventState};
pub use isapi_stream::{StreamStats, StreamStatus};
