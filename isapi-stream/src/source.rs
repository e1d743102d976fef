//! Where stream bytes come from.
//!
//! The supervisor only needs "open a connection" and "read the next chunk".
//! Keeping that behind traits lets the reconnect logic run against scripted
//! sources in tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use isapi_client::{EventStream, IsapiClient};

use crate::error::Result;

/// One open connection
#[async_trait]
pub trait ChunkStream: Send {
    /// Next chunk of body bytes; `Ok(None)` when the peer ends the body
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Opens connections for the supervisor
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ChunkStream>>;
}

#[async_trait]
impl ChunkStream for EventStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(EventStream::next_chunk(self).await?)
    }
}

/// `alertStream` on a recorder, through the shared authenticated client
#[derive(Debug, Clone)]
pub struct IsapiAlertSource {
    client: Arc<IsapiClient>,
    path: String,
}

impl IsapiAlertSource {
    pub fn new(client: Arc<IsapiClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl AlertSource for IsapiAlertSource {
    async fn open(&self) -> Result<Box<dyn ChunkStream>> {
        let stream = self.client.open_event_stream(&self.path).await?;
        Ok(Box::new(stream))
    }
}
