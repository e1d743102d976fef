//! EventSession - one recorder, one stream, one channel registry
//!
//! Setup order on [`EventSession::start`]:
//! 1. validate the configuration
//! 2. load timeout overrides, migrating legacy text into an empty store
//! 3. build the registry and probe device info
//! 4. discover channels
//! 5. spawn the reconnect supervisor feeding the registry

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use channel_state::{parse_overrides, ChannelRegistry, TimeoutOverrides, TimeoutStore};
use isapi_client::IsapiClient;
use isapi_parser::{ChannelId, DeviceInfo, EventRecord};
use isapi_stream::{
    spawn_with_token, CancellationToken, EventSink, IsapiAlertSource, StreamStats, StreamStatus,
    SupervisorHandle,
};

use crate::config::SessionConfig;
use crate::discovery::discover_channels;
use crate::error::{Result, SessionError};

/// A running bridge for one recorder.
///
/// Dropping the session stops the stream and cancels pending timers without
/// waiting; [`shutdown`](Self::shutdown) does the same and awaits the stream
/// task.
pub struct EventSession {
    config: SessionConfig,
    client: Arc<IsapiClient>,
    registry: ChannelRegistry,
    store: Arc<dyn TimeoutStore>,
    /// Held across an override change and its save so saves land in order
    timeout_update: Mutex<()>,
    device_info: Option<DeviceInfo>,
    cancel: CancellationToken,
    status_rx: watch::Receiver<StreamStatus>,
    stats: Arc<StreamStats>,
    supervisor: Option<SupervisorHandle>,
}

impl EventSession {
    /// Check a configuration the way a setup form would: field checks, then
    /// an authenticated device info request that must answer 200.
    pub async fn validate(config: &SessionConfig) -> Result<()> {
        config.validate()?;
        let client = IsapiClient::new(&config.client_config())
            .map_err(|e| SessionError::CannotConnect(e.to_string()))?;

        if client.validate_device_info().await {
            Ok(())
        } else {
            Err(SessionError::CannotConnect(format!(
                "device info request to {} failed",
                client.base_url()
            )))
        }
    }

    /// Set up and start streaming. An unreachable device does not fail the
    /// start; the supervisor keeps reconnecting.
    pub async fn start(config: SessionConfig, store: Arc<dyn TimeoutStore>) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(IsapiClient::new(&config.client_config())?);

        let overrides = load_overrides(&config, store.as_ref()).await?;
        let registry = ChannelRegistry::new(config.registry_config(overrides));

        let device_info = client.fetch_device_info().await;
        match device_info.as_ref().and_then(DeviceInfo::display_name) {
            Some(name) => info!("Connected to {} at {}", name, client.base_url()),
            None => warn!("No device info from {}", client.base_url()),
        }

        let channels = discover_channels(&client).await;
        registry.add_discovered_channels(&channels);

        let sink_registry = registry.clone();
        let sink: Arc<dyn EventSink> = Arc::new(move |event: EventRecord| {
            sink_registry.process_event(&event);
        });

        let supervisor_config = config.supervisor_config();
        let source = IsapiAlertSource::new(Arc::clone(&client), supervisor_config.stream_path.clone());
        let cancel = CancellationToken::new();
        let supervisor = spawn_with_token(source, sink, supervisor_config, cancel.clone());

        Ok(Self {
            status_rx: supervisor.subscribe_status(),
            stats: supervisor.stats(),
            supervisor: Some(supervisor),
            config,
            client,
            registry,
            store,
            timeout_update: Mutex::new(()),
            device_info,
            cancel,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<IsapiClient> {
        &self.client
    }

    /// Channel state and listener registration
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn status(&self) -> StreamStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Change one channel's hold time and persist the full override map.
    ///
    /// `secs` is clamped; the applied value is returned. A timer already
    /// pending keeps its original deadline.
    pub async fn set_channel_timeout(&self, channel: ChannelId, secs: i64) -> Result<u32> {
        let _update = self.timeout_update.lock().await;
        let overrides = self.registry.set_channel_timeout(channel, secs);
        self.store.save(&overrides).await?;

        let applied = self.registry.channel_timeout(channel);
        info!("Channel {} off delay set to {}s", channel, applied);
        Ok(applied)
    }

    /// Stop the stream, cancel pending timers and wait for the stream task
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        self.registry.shutdown();
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.stop().await?;
        }
        info!("Session for {} shut down", self.client.base_url());
        Ok(())
    }
}

impl Drop for EventSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.registry.shutdown();
    }
}

/// Stored overrides, or the legacy text's overrides when the store is empty.
/// A migration is written back so it happens once.
async fn load_overrides(config: &SessionConfig, store: &dyn TimeoutStore) -> Result<TimeoutOverrides> {
    let stored = store.load().await?;
    if !stored.is_empty() {
        debug!("Loaded {} timeout override(s)", stored.len());
        return Ok(stored);
    }

    let Some(text) = config.legacy_overrides.as_deref() else {
        return Ok(stored);
    };
    let migrated = parse_overrides(text);
    if !migrated.is_empty() {
        store.save(&migrated).await?;
        info!("Migrated {} legacy timeout override(s)", migrated.len());
    }
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_state::MemoryTimeoutStore;

    fn config() -> SessionConfig {
        SessionConfig::new("127.0.0.1", "admin", "pw")
    }

    #[tokio::test]
    async fn test_legacy_text_migrated_into_empty_store() {
        let store = MemoryTimeoutStore::new();
        let config = config().with_legacy_overrides("1=10\n2=5000\nbogus");

        let overrides = load_overrides(&config, &store).await.unwrap();
        assert_eq!(overrides, TimeoutOverrides::from([(1, 10), (2, 1800)]));
        assert_eq!(store.snapshot(), overrides);
    }

    #[tokio::test]
    async fn test_stored_overrides_win_over_legacy_text() {
        let store = MemoryTimeoutStore::with_overrides(TimeoutOverrides::from([(3, 45)]));
        let config = config().with_legacy_overrides("1=10");

        let overrides = load_overrides(&config, &store).await.unwrap();
        assert_eq!(overrides, TimeoutOverrides::from([(3, 45)]));
    }

    #[tokio::test]
    async fn test_no_overrides_anywhere() {
        let store = MemoryTimeoutStore::new();
        assert!(load_overrides(&config(), &store).await.unwrap().is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_config_before_connecting() {
        let err = EventSession::validate(&config().with_off_delay(5000)).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig(_)));
    }
}
