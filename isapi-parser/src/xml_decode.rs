//! XML decoding utilities shared by the ISAPI decoders.
//!
//! Hikvision firmwares differ in whether they qualify element names with a
//! namespace prefix (`<hik:deviceName>` vs `<deviceName>`). Everything in this
//! crate compares local names only, so the helpers here strip prefixes before
//! handing a payload to serde.

use std::iter::Peekable;

use serde::de::DeserializeOwned;

use crate::error::{ParseError, ParseResult};

/// Parse XML string into a deserializable type with namespace stripping.
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    let stripped = strip_namespaces(xml);
    quick_xml::de::from_str(&stripped)
        .map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Return the local part of a possibly prefixed XML name.
///
/// `hik:channelID` becomes `channelID`; unprefixed names are returned as-is.
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Strip namespace prefixes and `xmlns` declarations from XML content.
///
/// # Example
///
/// Input: `<hik:DeviceInfo xmlns:hik="urn:x"><hik:model>DS-7608</hik:model></hik:DeviceInfo>`
/// Output: `<DeviceInfo><model>DS-7608</model></DeviceInfo>`
pub fn strip_namespaces(xml: &str) -> String {
    let mut result = String::with_capacity(xml.len());
    let mut chars = xml.chars().peekable();

    while let Some(c) = chars.next() {
        result.push(c);
        if c != '<' {
            continue;
        }

        if let Some(slash) = chars.next_if_eq(&'/') {
            result.push(slash);
        }

        // Declarations, comments and CDATA are copied through untouched
        if matches!(chars.peek(), Some('?') | Some('!')) {
            for ch in chars.by_ref() {
                result.push(ch);
                if ch == '>' {
                    break;
                }
            }
            continue;
        }

        let tag_name = take_until(&mut chars, |ch| ch.is_whitespace() || ch == '>' || ch == '/');
        result.push_str(local_name(&tag_name));

        // Attributes
        while let Some(&ch) = chars.peek() {
            if ch == '>' {
                result.push(ch);
                chars.next();
                break;
            }
            if ch == '/' || ch.is_whitespace() {
                result.push(ch);
                chars.next();
                continue;
            }

            let attr_name = take_until(&mut chars, |ach| {
                ach == '=' || ach.is_whitespace() || ach == '>' || ach == '/'
            });

            if attr_name.starts_with("xmlns") {
                chars.next_if_eq(&'=');
                if let Some(quote) = chars.next_if(|&q| q == '"' || q == '\'') {
                    for ch in chars.by_ref() {
                        if ch == quote {
                            break;
                        }
                    }
                }
                continue;
            }

            result.push_str(local_name(&attr_name));
            if let Some(eq) = chars.next_if_eq(&'=') {
                result.push(eq);
                if let Some(quote) = chars.next_if(|&q| q == '"' || q == '\'') {
                    result.push(quote);
                    for ch in chars.by_ref() {
                        result.push(ch);
                        if ch == quote {
                            break;
                        }
                    }
                }
            }
        }
    }

    result
}

fn take_until<I>(chars: &mut Peekable<I>, stop: impl Fn(char) -> bool) -> String
where
    I: Iterator<Item = char>,
{
    let mut taken = String::new();
    while let Some(ch) = chars.next_if(|&ch| !stop(ch)) {
        taken.push(ch);
    }
    taken
}
