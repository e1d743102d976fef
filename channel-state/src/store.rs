//! Persistence of per-channel timeout overrides.
//!
//! The host decides where overrides live. This module defines the contract
//! and ships a JSON file backend plus an in-memory one.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::Result;
use crate::timeouts::{clamp_timeout, TimeoutOverrides};

/// Load/save contract for one session's overrides. Saves always replace the
/// whole map.
#[async_trait]
pub trait TimeoutStore: Send + Sync {
    /// Stored overrides; an empty map when nothing was saved yet
    async fn load(&self) -> Result<TimeoutOverrides>;

    async fn save(&self, overrides: &TimeoutOverrides) -> Result<()>;
}

/// Overrides kept in memory only
#[derive(Debug, Default)]
pub struct MemoryTimeoutStore {
    overrides: Mutex<TimeoutOverrides>,
}

impl MemoryTimeoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: TimeoutOverrides) -> Self {
        Self {
            overrides: Mutex::new(overrides),
        }
    }

    pub fn snapshot(&self) -> TimeoutOverrides {
        self.overrides.lock().clone()
    }
}

#[async_trait]
impl TimeoutStore for MemoryTimeoutStore {
    async fn load(&self) -> Result<TimeoutOverrides> {
        Ok(self.snapshot())
    }

    async fn save(&self, overrides: &TimeoutOverrides) -> Result<()> {
        *self.overrides.lock() = overrides.clone();
        Ok(())
    }
}

#[derive(Serialize)]
struct StoredTimeouts<'a> {
    channel_timeouts: BTreeMap<String, &'a u32>,
}

/// Overrides stored as `{"channel_timeouts": {"<channel>": <seconds>}}`
#[derive(Debug, Clone)]
pub struct JsonFileTimeoutStore {
    path: PathBuf,
}

impl JsonFileTimeoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for session `key` under `dir`, e.g. `<dir>/isapi_events.<key>.json`
    pub fn for_session(dir: impl AsRef<Path>, key: &str) -> Self {
        Self::new(dir.as_ref().join(format!("isapi_events.{key}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TimeoutStore for JsonFileTimeoutStore {
    async fn load(&self) -> Result<TimeoutOverrides> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No timeout store at {}", self.path.display());
                return Ok(TimeoutOverrides::new());
            }
            Err(e) => return Err(e.into()),
        };

        let document: Value = match serde_json::from_slice(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!("Ignoring unreadable timeout store {}: {}", self.path.display(), e);
                return Ok(TimeoutOverrides::new());
            }
        };
        match document.as_object() {
            Some(object) => Ok(overrides_from_value(
                object.get("channel_timeouts").unwrap_or(&Value::Null),
            )),
            None => {
                warn!("Ignoring non-object timeout store {}", self.path.display());
                Ok(TimeoutOverrides::new())
            }
        }
    }

    async fn save(&self, overrides: &TimeoutOverrides) -> Result<()> {
        let stored = StoredTimeouts {
            channel_timeouts: overrides
                .iter()
                .map(|(channel, secs)| (channel.to_string(), secs))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&stored)?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_replacing(&path, &json))
            .await
            .map_err(io::Error::other)??;

        debug!("Saved {} timeout override(s) to {}", overrides.len(), self.path.display());
        Ok(())
    }
}

/// Write `contents` to a fresh temp file next to `path`, then move it over
/// `path`. Concurrent writers never share a temp file.
fn write_replacing(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Keep entries with an integer channel key and an integer (or integer
/// string) value; drop the rest.
fn overrides_from_value(value: &Value) -> TimeoutOverrides {
    let Some(entries) = value.as_object() else {
        if !value.is_null() {
            warn!("Ignoring non-object channel_timeouts");
        }
        return TimeoutOverrides::new();
    };

    entries
        .iter()
        .filter_map(|(channel, secs)| {
            let channel = channel.trim().parse().ok()?;
            let secs = match secs {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            Some((channel, clamp_timeout(secs)))
        })
        .collect()
}
