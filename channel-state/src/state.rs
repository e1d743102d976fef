//! Per-channel sensor state
//!
//! A channel carries three independent flags. Motion is raised by every
//! `active` alert; human and vehicle are raised in addition when the alert's
//! target classification says so. Nothing lowers a single flag on its own:
//! `inactive` or the auto-off timer clears all three together.

use std::fmt;

use serde::Serialize;

use isapi_parser::{ChannelId, EventRecord, EventState};

/// Diagnostic state recorded when the auto-off timer fires
pub const EXPIRED_STATE: &str = "inactive";

/// The three boolean signals a channel exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Motion,
    Human,
    Vehicle,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Motion, SensorKind::Human, SensorKind::Vehicle];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Motion => "motion",
            SensorKind::Human => "human",
            SensorKind::Vehicle => "vehicle",
        }
    }

    /// Classification sensor for an alert target, if any
    pub fn from_target(target: &str) -> Option<Self> {
        if target.eq_ignore_ascii_case("human") {
            Some(SensorKind::Human)
        } else if target.eq_ignore_ascii_case("vehicle") {
            Some(SensorKind::Vehicle)
        } else {
            None
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an applied event did to the flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// `active`: flags raised, auto-off must be (re)scheduled
    Activated,
    /// `inactive`: flags cleared, pending auto-off must be cancelled
    Deactivated,
    /// Any other state: only diagnostics refreshed
    Refreshed,
}

/// Snapshot of one channel. Listeners always receive a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub motion: bool,
    pub human: bool,
    pub vehicle: bool,
    /// Recorder timestamp of the last processed alert, verbatim
    pub last_event_time: Option<String>,
    /// Lower-cased state of the last alert, `inactive` after an auto-off
    pub last_event_state: Option<String>,
    pub last_target_type: Option<String>,
    pub last_event_type: Option<String>,
}

impl ChannelState {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            motion: false,
            human: false,
            vehicle: false,
            last_event_time: None,
            last_event_state: None,
            last_target_type: None,
            last_event_type: None,
        }
    }

    pub fn is_on(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Motion => self.motion,
            SensorKind::Human => self.human,
            SensorKind::Vehicle => self.vehicle,
        }
    }

    pub fn any_on(&self) -> bool {
        self.motion || self.human || self.vehicle
    }

    pub(crate) fn apply(&mut self, event: &EventRecord) -> Transition {
        self.last_event_time = event.date_time.clone();
        self.last_event_state = event
            .event_state
            .as_ref()
            .map(|state| state.as_str().to_lowercase())
            .filter(|state| !state.is_empty());
        self.last_target_type = event
            .target_type
            .as_ref()
            .map(|target| target.to_lowercase())
            .filter(|target| !target.is_empty());
        self.last_event_type = event.event_type.clone();

        match event.event_state {
            Some(EventState::Active) => {
                self.motion = true;
                match self.last_target_type.as_deref().and_then(SensorKind::from_target) {
                    Some(SensorKind::Human) => self.human = true,
                    Some(SensorKind::Vehicle) => self.vehicle = true,
                    _ => {}
                }
                Transition::Activated
            }
            Some(EventState::Inactive) => {
                self.clear_flags();
                Transition::Deactivated
            }
            _ => Transition::Refreshed,
        }
    }

    pub(crate) fn expire(&mut self) {
        self.clear_flags();
        self.last_event_state = Some(EXPIRED_STATE.to_string());
    }

    fn clear_flags(&mut self) {
        self.motion = false;
        self.human = false;
        self.vehicle = false;
    }
}
