//! Channel registry: owns every channel's state and its auto-off timer.
//!
//! All mutation happens under one lock. Each scheduled timer carries a
//! generation number; when a timer fires it only takes effect if its
//! generation is still the channel's current one, so an `active` alert that
//! races an expiring timer always wins. Listeners run after the lock is
//! released and receive a snapshot taken under it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use isapi_parser::{ChannelId, EventRecord};

use crate::listener::{ListenerHandle, ListenerSet};
use crate::state::{ChannelState, Transition};
use crate::timeouts::{TimeoutConfig, TimeoutOverrides};

/// Event type processed when none is configured
pub const DEFAULT_EVENT_TYPE: &str = "VMD";

/// Registry construction parameters
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Fallback auto-off delay, clamped to 0..=1800
    pub default_timeout_secs: i64,
    /// Initial per-channel overrides, clamped the same way
    pub overrides: TimeoutOverrides,
    /// Event types that reach the state machine, matched exactly
    pub accepted_event_types: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            overrides: TimeoutOverrides::new(),
            accepted_event_types: vec![DEFAULT_EVENT_TYPE.to_string()],
        }
    }
}

struct PendingTimer {
    generation: u64,
    task: JoinHandle<()>,
}

struct ChannelSlot {
    state: ChannelState,
    timer: Option<PendingTimer>,
}

impl ChannelSlot {
    fn new(channel: ChannelId) -> Self {
        Self {
            state: ChannelState::new(channel),
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
        }
    }
}

struct RegistryInner {
    channels: Mutex<HashMap<ChannelId, ChannelSlot>>,
    timeouts: RwLock<TimeoutConfig>,
    accepted_event_types: HashSet<String>,
    state_listeners: ListenerSet<ChannelState>,
    channel_listeners: ListenerSet<ChannelId>,
    next_generation: AtomicU64,
    shut_down: AtomicBool,
}

/// Owned, cloneable handle to one session's channels
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

impl ChannelRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let timeouts = TimeoutConfig::new(config.default_timeout_secs).with_overrides(&config.overrides);
        Self {
            inner: Arc::new(RegistryInner {
                channels: Mutex::new(HashMap::new()),
                timeouts: RwLock::new(timeouts),
                accepted_event_types: config.accepted_event_types.into_iter().collect(),
                state_listeners: ListenerSet::new(),
                channel_listeners: ListenerSet::new(),
                next_generation: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Get or create a channel. "New channel" listeners have been notified by
    /// the time this returns for a first-seen ID.
    pub fn ensure_channel(&self, channel: ChannelId) -> ChannelState {
        let (snapshot, created) = {
            let mut channels = self.inner.channels.lock();
            let created = !channels.contains_key(&channel);
            let slot = channels
                .entry(channel)
                .or_insert_with(|| ChannelSlot::new(channel));
            (slot.state.clone(), created)
        };

        if created {
            self.announce(channel);
        }
        snapshot
    }

    /// Create empty state for every discovered channel
    pub fn add_discovered_channels(&self, channels: &[ChannelId]) {
        for &channel in channels {
            self.ensure_channel(channel);
        }
    }

    /// Known channel IDs, ascending
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.inner.channels.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn state(&self, channel: ChannelId) -> Option<ChannelState> {
        self.inner
            .channels
            .lock()
            .get(&channel)
            .map(|slot| slot.state.clone())
    }

    /// Snapshots of all channels, ascending by ID
    pub fn states(&self) -> Vec<ChannelState> {
        let mut states: Vec<ChannelState> = self
            .inner
            .channels
            .lock()
            .values()
            .map(|slot| slot.state.clone())
            .collect();
        states.sort_unstable_by_key(|state| state.channel_id);
        states
    }

    /// Apply one decoded alert.
    ///
    /// Returns the channel snapshot after the change, or `None` when the
    /// alert was filtered out (unaccepted event type or no channel ID).
    /// State listeners are notified for every processed alert, changed or not.
    pub fn process_event(&self, event: &EventRecord) -> Option<ChannelState> {
        let event_type = event.event_type.as_deref()?;
        if !self.inner.accepted_event_types.contains(event_type) {
            debug!("Ignoring {} event", event_type);
            return None;
        }
        let channel = event.channel_id?;

        let (snapshot, created) = {
            let mut channels = self.inner.channels.lock();
            let created = !channels.contains_key(&channel);
            let slot = channels
                .entry(channel)
                .or_insert_with(|| ChannelSlot::new(channel));

            match slot.state.apply(event) {
                Transition::Activated => self.schedule_off(channel, slot),
                Transition::Deactivated => slot.cancel_timer(),
                Transition::Refreshed => {}
            }
            (slot.state.clone(), created)
        };

        debug!(
            "Channel {}: {} motion={} human={} vehicle={}",
            channel,
            snapshot.last_event_state.as_deref().unwrap_or("-"),
            snapshot.motion,
            snapshot.human,
            snapshot.vehicle
        );

        if created {
            self.announce(channel);
        }
        self.inner.state_listeners.notify(&snapshot);
        Some(snapshot)
    }

    /// Resolved auto-off delay for `channel`
    pub fn channel_timeout(&self, channel: ChannelId) -> u32 {
        self.inner.timeouts.read().resolve(channel)
    }

    pub fn default_timeout(&self) -> u32 {
        self.inner.timeouts.read().default_secs()
    }

    /// Store a clamped override and return the full override map for
    /// persistence. A timer already pending keeps its original delay.
    pub fn set_channel_timeout(&self, channel: ChannelId, secs: i64) -> TimeoutOverrides {
        let mut timeouts = self.inner.timeouts.write();
        let stored = timeouts.set(channel, secs);
        info!("Channel {} auto-off timeout set to {}s", channel, stored);
        timeouts.overrides().clone()
    }

    pub fn timeout_overrides(&self) -> TimeoutOverrides {
        self.inner.timeouts.read().overrides().clone()
    }

    /// Whether `channel` has an auto-off timer pending
    pub fn has_pending_timer(&self, channel: ChannelId) -> bool {
        self.inner
            .channels
            .lock()
            .get(&channel)
            .is_some_and(|slot| slot.timer.is_some())
    }

    /// Register for channel state snapshots after every change
    pub fn add_state_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ChannelState) + Send + Sync + 'static,
    {
        self.inner.state_listeners.add(callback)
    }

    /// Register for first-seen channel IDs
    pub fn add_channel_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ChannelId) + Send + Sync + 'static,
    {
        self.inner.channel_listeners.add(callback)
    }

    /// Cancel every pending timer. No timers are scheduled afterwards.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        let mut channels = self.inner.channels.lock();
        let cancelled = channels
            .values_mut()
            .filter(|slot| slot.timer.is_some())
            .map(ChannelSlot::cancel_timer)
            .count();
        debug!("Registry shut down, {} timer(s) cancelled", cancelled);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    fn announce(&self, channel: ChannelId) {
        info!("New channel {}", channel);
        self.inner.channel_listeners.notify(&channel);
    }

    /// Replace any pending timer on `slot` with a fresh one. Called with the
    /// channel lock held.
    fn schedule_off(&self, channel: ChannelId, slot: &mut ChannelSlot) {
        slot.cancel_timer();

        if self.is_shut_down() {
            return;
        }
        let delay = self.channel_timeout(channel);
        if delay == 0 {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime, channel {} will not auto-off", channel);
            return;
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(delay))).await;
            if let Some(inner) = registry.upgrade() {
                ChannelRegistry { inner }.expire(channel, generation);
            }
        });
        slot.timer = Some(PendingTimer { generation, task });
    }

    fn expire(&self, channel: ChannelId, generation: u64) {
        let snapshot = {
            let mut channels = self.inner.channels.lock();
            let Some(slot) = channels.get_mut(&channel) else {
                return;
            };
            if slot.timer.as_ref().map(|timer| timer.generation) != Some(generation) {
                debug!("Stale timer for channel {} ignored", channel);
                return;
            }
            // Dropping our own JoinHandle detaches; the task is finishing anyway
            slot.timer = None;
            slot.state.expire();
            slot.state.clone()
        };

        debug!("Channel {} auto-off", channel);
        self.inner.state_listeners.notify(&snapshot);
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.inner.channels.lock().len())
            .field("state_listeners", &self.inner.state_listeners.len())
            .field("channel_listeners", &self.inner.channel_listeners.len())
            .finish()
    }
}
