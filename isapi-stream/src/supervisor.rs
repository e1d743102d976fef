//! Reconnect supervisor: owns the lifecycle of the one stream per session.
//!
//! ```text
//! Connecting ──open ok──► Streaming ──failure──► Backoff(d) ──sleep d──► Connecting
//!      │                      │                      │
//!      └──────────────────────┴──── cancel ──────────┴──► Stopped
//! ```
//!
//! Any failure (open error, idle timeout while opening or reading, transport
//! error, end of body) leads to a backoff sleep that doubles up to the cap.
//! Each decoded event resets the delay to its base. Cancellation interrupts a pending open, a blocked
//! read or a backoff sleep, and is never treated as a failure.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use isapi_parser::{decode_event, DocumentExtractor, EventRecord};

use crate::backoff::Backoff;
use crate::config::SupervisorConfig;
use crate::error::{Result, StreamError};
use crate::source::AlertSource;

/// Observable lifecycle of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Connecting,
    Streaming,
    /// Waiting this long before the next connection attempt
    Backoff(Duration),
    Stopped,
}

/// Receiver of decoded events, called inline in wire order
pub trait EventSink: Send + Sync {
    fn handle(&self, event: EventRecord);
}

impl<F> EventSink for F
where
    F: Fn(EventRecord) + Send + Sync,
{
    fn handle(&self, event: EventRecord) {
        self(event)
    }
}

/// Counters kept across connections
#[derive(Debug, Default)]
pub struct StreamStats {
    connections: AtomicU64,
    events: AtomicU64,
    discarded_documents: AtomicU64,
    truncations: AtomicU64,
}

impl StreamStats {
    /// Successful stream opens
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Decoded events handed to the sink
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Extracted documents that did not decode
    pub fn discarded_documents(&self) -> u64 {
        self.discarded_documents.load(Ordering::Relaxed)
    }

    /// Buffer truncations on marker-less input
    pub fn truncations(&self) -> u64 {
        self.truncations.load(Ordering::Relaxed)
    }
}

/// Handle to a running supervisor task
#[derive(Debug)]
pub struct SupervisorHandle {
    cancel: CancellationToken,
    status_rx: watch::Receiver<StreamStatus>,
    stats: Arc<StreamStats>,
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn status(&self) -> StreamStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal stop and wait for the task to end
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.join
            .await
            .map_err(|e| StreamError::TaskFailed(e.to_string()))
    }
}

/// Spawn a supervisor on the current runtime
pub fn spawn<S>(source: S, sink: Arc<dyn EventSink>, config: SupervisorConfig) -> SupervisorHandle
where
    S: AlertSource + 'static,
{
    spawn_with_token(source, sink, config, CancellationToken::new())
}

/// Spawn a supervisor that stops when `cancel` fires
pub fn spawn_with_token<S>(
    source: S,
    sink: Arc<dyn EventSink>,
    config: SupervisorConfig,
    cancel: CancellationToken,
) -> SupervisorHandle
where
    S: AlertSource + 'static,
{
    let (status_tx, status_rx) = watch::channel(StreamStatus::Connecting);
    let stats = Arc::new(StreamStats::default());

    let supervisor = ReconnectSupervisor {
        source,
        sink,
        config,
        cancel: cancel.clone(),
        status_tx,
        stats: Arc::clone(&stats),
    };
    let join = tokio::spawn(supervisor.run());

    SupervisorHandle {
        cancel,
        status_rx,
        stats,
        join,
    }
}

struct ReconnectSupervisor<S> {
    source: S,
    sink: Arc<dyn EventSink>,
    config: SupervisorConfig,
    cancel: CancellationToken,
    status_tx: watch::Sender<StreamStatus>,
    stats: Arc<StreamStats>,
}

impl<S: AlertSource> ReconnectSupervisor<S> {
    async fn run(self) {
        info!("Alert stream supervisor started ({})", self.config.stream_path);
        let mut backoff = Backoff::new(self.config.base_backoff, self.config.max_backoff);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.set_status(StreamStatus::Connecting);

            let error = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = self.connection(&mut backoff) => match outcome {
                    Ok(never) => match never {},
                    Err(error) => error,
                },
            };

            let delay = backoff.next_delay();
            warn!("Alert stream failed: {}; reconnecting in {:?}", error, delay);
            self.set_status(StreamStatus::Backoff(delay));

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_status(StreamStatus::Stopped);
        info!("Alert stream supervisor stopped");
    }

    /// Open one connection and consume it until it fails
    async fn connection(&self, backoff: &mut Backoff) -> Result<Infallible> {
        let idle = self.config.idle_timeout;
        // A device that accepts the connection but never answers is idle too
        let mut stream = tokio::time::timeout(idle, self.source.open())
            .await
            .map_err(|_| StreamError::IdleTimeout(idle))??;
        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        self.set_status(StreamStatus::Streaming);
        info!("Alert stream connected");

        let mut extractor = DocumentExtractor::new();
        loop {
            let chunk = tokio::time::timeout(idle, stream.next_chunk())
                .await
                .map_err(|_| StreamError::IdleTimeout(idle))??
                .ok_or(StreamError::Closed)?;

            let truncations_before = extractor.truncations();
            for document in extractor.feed(&chunk) {
                match decode_event(&document) {
                    Some(event) => {
                        backoff.reset();
                        self.stats.events.fetch_add(1, Ordering::Relaxed);
                        self.sink.handle(event);
                    }
                    None => {
                        self.stats.discarded_documents.fetch_add(1, Ordering::Relaxed);
                        debug!("Discarded undecodable document ({} bytes)", document.len());
                    }
                }
            }
            let truncated = extractor.truncations() - truncations_before;
            if truncated > 0 {
                self.stats.truncations.fetch_add(truncated, Ordering::Relaxed);
            }
        }
    }

    fn set_status(&self, status: StreamStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            debug!("Stream status {:?} -> {:?}", previous, status);
        }
    }
}
