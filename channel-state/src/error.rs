//! Error types for channel state persistence and configuration

use thiserror::Error;

/// Errors from a [`TimeoutStore`](crate::TimeoutStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Timeout store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A line of override text that is not `channel=seconds` within range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timeout override on line {line}: {content:?}")]
pub struct OverrideError {
    /// 1-based line number
    pub line: usize,
    pub content: String,
}

pub type Result<T> = std::result::Result<T, StoreError>;
