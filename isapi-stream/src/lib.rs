//! # isapi-events-stream
//!
//! Keeps one `alertStream` connection to a recorder alive and turns its body
//! into decoded [`EventRecord`](isapi_parser::EventRecord)s.
//!
//! A [`supervisor`] task opens the stream through an [`AlertSource`], feeds
//! every chunk through the document extractor and hands each decoded event to
//! an [`EventSink`] in wire order. Failures of any kind lead to an
//! exponential [`backoff`] and a fresh connection; cancellation stops the task
//! promptly from any state.

pub mod backoff;
pub mod config;
pub mod error;
pub mod source;
pub mod supervisor;

pub use backoff::Backoff;
pub use config::{SupervisorConfig, MAX_BASE_BACKOFF, MIN_BASE_BACKOFF};
pub use error::{Result, StreamError};
pub use source::{AlertSource, ChunkStream, IsapiAlertSource};
pub use supervisor::{
    spawn, spawn_with_token, EventSink, StreamStats, StreamStatus, SupervisorHandle,
};

pub use tokio_util::sync::CancellationToken;
