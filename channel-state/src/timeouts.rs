//! Auto-off timeouts: clamping, per-channel overrides and the legacy
//! `channel=seconds` override text.

use std::collections::BTreeMap;

use isapi_parser::ChannelId;

use crate::error::OverrideError;

pub const MIN_TIMEOUT_SECS: u32 = 0;
pub const MAX_TIMEOUT_SECS: u32 = 1800;

/// Per-channel overrides, channel ID to seconds
pub type TimeoutOverrides = BTreeMap<ChannelId, u32>;

/// Clamp any integer to the accepted timeout range
pub fn clamp_timeout(secs: i64) -> u32 {
    secs.clamp(MIN_TIMEOUT_SECS as i64, MAX_TIMEOUT_SECS as i64) as u32
}

/// Default timeout plus per-channel overrides, all clamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    default_secs: u32,
    overrides: TimeoutOverrides,
}

impl TimeoutConfig {
    pub fn new(default_secs: i64) -> Self {
        Self {
            default_secs: clamp_timeout(default_secs),
            overrides: TimeoutOverrides::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: &TimeoutOverrides) -> Self {
        self.overrides = overrides
            .iter()
            .map(|(&channel, &secs)| (channel, clamp_timeout(secs as i64)))
            .collect();
        self
    }

    pub fn default_secs(&self) -> u32 {
        self.default_secs
    }

    pub fn overrides(&self) -> &TimeoutOverrides {
        &self.overrides
    }

    /// Override for `channel`, else the default
    pub fn resolve(&self, channel: ChannelId) -> u32 {
        self.overrides.get(&channel).copied().unwrap_or(self.default_secs)
    }

    /// Store a clamped override and return the value actually stored
    pub fn set(&mut self, channel: ChannelId, secs: i64) -> u32 {
        let clamped = clamp_timeout(secs);
        self.overrides.insert(channel, clamped);
        clamped
    }
}

/// Lenient parse of override text, one `channel=seconds` per line.
///
/// Blank lines, lines without `=` and lines whose sides are not integers are
/// skipped; seconds are clamped. Later lines win.
pub fn parse_overrides(text: &str) -> TimeoutOverrides {
    text.lines()
        .filter_map(parse_line)
        .map(|(channel, secs)| (channel, clamp_timeout(secs)))
        .collect()
}

/// Strict check of override text.
///
/// Every non-blank line must be `channel=seconds` with seconds inside
/// [`MIN_TIMEOUT_SECS`]..=[`MAX_TIMEOUT_SECS`].
pub fn validate_overrides(text: &str) -> Result<(), OverrideError> {
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let in_range = parse_line(line)
            .is_some_and(|(_, secs)| (MIN_TIMEOUT_SECS as i64..=MAX_TIMEOUT_SECS as i64).contains(&secs));
        if !in_range {
            return Err(OverrideError {
                line: index + 1,
                content: line.trim().to_string(),
            });
        }
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<(ChannelId, i64)> {
    let (channel, secs) = line.trim().split_once('=')?;
    Some((channel.trim().parse().ok()?, secs.trim().parse().ok()?))
}
