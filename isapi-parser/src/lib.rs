//! # isapi-parser
//!
//! Payload handling for the Hikvision ISAPI event notification stream.
//!
//! The `alertStream` endpoint never finishes its response body. Bytes arrive
//! in arbitrary chunks and contain a sequence of `<EventNotificationAlert>`
//! documents separated by multipart boundaries. This crate turns those bytes
//! into [`EventRecord`]s:
//!
//! ```rust
//! use isapi_parser::{decode_event, DocumentExtractor};
//!
//! let mut extractor = DocumentExtractor::new();
//! let chunk = b"--boundary\r\n\r\n<EventNotificationAlert><channelID>1</channelID>\
//!     <eventType>VMD</eventType><eventState>active</eventState></EventNotificationAlert>";
//!
//! for document in extractor.feed(chunk) {
//!     let event = decode_event(&document).expect("valid alert");
//!     assert_eq!(event.channel_id, Some(1));
//! }
//! ```
//!
//! It also decodes the channel discovery and device info responses used
//! during session setup.

pub mod channels;
pub mod device_info;
pub mod error;
pub mod event;
pub mod extractor;
pub mod xml_decode;

pub use channels::decode_channel_ids;
pub use device_info::{decode_device_info, DeviceInfo};
pub use error::{ParseError, ParseResult};
pub use event::{decode_event, ChannelId, EventRecord, EventState};
pub use extractor::DocumentExtractor;
