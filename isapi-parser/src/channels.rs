//! Channel discovery responses.
//!
//! Recorders answer `/ISAPI/System/Video/inputs/channels` and
//! `/ISAPI/ContentMgmt/InputProxy/channels` with lists whose entries carry
//! either an `<id>` or a `<channelID>` element, depending on the model.

use std::collections::BTreeSet;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::event::ChannelId;

const ID_ELEMENTS: [&str; 2] = ["channelID", "id"];

/// Collect channel IDs from a discovery response.
///
/// Returns deduplicated IDs in ascending order. Entries that are not integers
/// are skipped. A syntax error stops the scan; IDs read before it are kept.
pub fn decode_channel_ids(xml: &str) -> Vec<ChannelId> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut ids = BTreeSet::new();
    let mut capturing = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                capturing = ID_ELEMENTS.iter().any(|id| id.as_bytes() == name.as_ref());
            }
            Ok(Event::Text(t)) if capturing => {
                match t.unescape() {
                    Ok(text) => match text.trim().parse::<ChannelId>() {
                        Ok(id) => {
                            ids.insert(id);
                        }
                        Err(_) => tracing::debug!("Skipping non-numeric channel id {:?}", text),
                    },
                    Err(e) => tracing::debug!("Skipping undecodable channel id: {}", e),
                }
                capturing = false;
            }
            Ok(Event::End(_)) => capturing = false,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "Channel list parse stopped at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }

    ids.into_iter().collect()
}
