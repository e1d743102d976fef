//! Decoding of a single `<EventNotificationAlert>` document.

use std::fmt;

use xmltree::{Element, XMLNode};

use crate::error::{ParseError, ParseResult};
use crate::xml_decode::local_name;

/// Integer identifier of a recorder input channel
pub type ChannelId = u32;

/// Local name of the alert document root
pub const ALERT_ROOT: &str = "EventNotificationAlert";

/// Transition reported by an alert
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventState {
    Active,
    Inactive,
    /// Anything else the recorder sends, kept lower-cased
    Other(String),
}

impl EventState {
    /// Case-insensitive parse; never fails
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            _ => Self::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded alert. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type tag, e.g. `VMD` (verbatim)
    pub event_type: Option<String>,
    pub event_state: Option<EventState>,
    pub channel_id: Option<ChannelId>,
    /// Target classification, lower-cased (`human`, `vehicle`, ...)
    pub target_type: Option<String>,
    /// Recorder timestamp, passed through verbatim
    pub date_time: Option<String>,
}

impl EventRecord {
    /// Parse an alert document.
    ///
    /// Each field takes the first element with a matching local name anywhere
    /// in the tree, root included. A matching element with blank text leaves
    /// the field empty even if a later element would have had content.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        let root = Element::parse(xml.as_bytes())
            .map_err(|e| ParseError::MalformedXml(e.to_string()))?;

        let root_name = local_name(&root.name);
        if root_name != ALERT_ROOT {
            return Err(ParseError::UnexpectedRoot {
                expected: ALERT_ROOT,
                found: root_name.to_string(),
            });
        }

        Ok(Self {
            event_type: first_text(&root, "eventType"),
            event_state: first_text(&root, "eventState").map(|s| EventState::parse(&s)),
            channel_id: first_text(&root, "channelID").and_then(|s| s.parse().ok()),
            target_type: first_text(&root, "targetType").map(|s| s.to_lowercase()),
            date_time: first_text(&root, "dateTime"),
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.event_state, Some(EventState::Active))
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self.event_state, Some(EventState::Inactive))
    }
}

/// Decode an alert document, returning `None` for anything that is not one.
///
/// Malformed fragments are routine on the stream, so failures are only logged.
pub fn decode_event(xml: &str) -> Option<EventRecord> {
    match EventRecord::from_xml(xml) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!("Discarding alert document: {}", e);
            None
        }
    }
}

/// Pre-order search for the first element named `name`, returning its
/// trimmed text or `None` when that text is blank.
fn first_text(element: &Element, name: &str) -> Option<String> {
    find_first(element, name).and_then(|found| {
        let text = found.get_text()?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn find_first<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if local_name(&element.name) == name {
        return Some(element);
    }
    element.children.iter().find_map(|child| match child {
        XMLNode::Element(child) => find_first(child, name),
        _ => None,
    })
}
