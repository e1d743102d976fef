//! Incremental extraction of alert documents from the `alertStream` body.
//!
//! The device never closes the response; it writes a multipart-ish body in
//! which every notification is a complete `<EventNotificationAlert>` element
//! surrounded by boundary lines and headers we do not care about. Chunks from
//! the transport are fed in as they arrive and whole documents come out.

use tracing::{debug, warn};

/// Opening marker of a notification document (attributes may follow)
pub const ALERT_START: &str = "<EventNotificationAlert";

/// Closing marker of a notification document
pub const ALERT_END: &str = "</EventNotificationAlert>";

/// Buffer size above which marker-less content is truncated
pub const MAX_BUFFERED: usize = 64 * 1024;

/// Amount of trailing content kept when truncating
pub const RETAINED_ON_TRUNCATE: usize = 32 * 1024;

/// Accumulates stream text and yields complete notification documents.
///
/// Memory stays bounded: when no start marker has been seen and the buffer
/// grows past [`MAX_BUFFERED`], only the trailing [`RETAINED_ON_TRUNCATE`]
/// bytes are kept. A document whose start marker is lost that way is dropped;
/// [`truncations`](Self::truncations) and
/// [`discarded_bytes`](Self::discarded_bytes) make that visible.
#[derive(Debug, Default)]
pub struct DocumentExtractor {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the previous chunk
    partial_char: Vec<u8>,
    truncations: u64,
    discarded_bytes: u64,
}

impl DocumentExtractor {
    /// Create an empty extractor
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every document completed by them, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.append_decoded(chunk);

        let mut documents = Vec::new();
        loop {
            let Some(start) = self.buffer.find(ALERT_START) else {
                if self.buffer.len() > MAX_BUFFERED {
                    self.truncate();
                }
                break;
            };

            let Some(end) = self.buffer[start..]
                .find(ALERT_END)
                .map(|offset| start + offset + ALERT_END.len())
            else {
                if start > 0 {
                    self.buffer.drain(..start);
                }
                break;
            };

            documents.push(self.buffer[start..end].to_string());
            self.buffer.drain(..end);
        }

        if !documents.is_empty() {
            debug!(
                "Extracted {} document(s), {} byte(s) still buffered",
                documents.len(),
                self.buffer.len()
            );
        }
        documents
    }

    /// Number of times marker-less content was truncated
    pub fn truncations(&self) -> u64 {
        self.truncations
    }

    /// Total bytes thrown away by truncation
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Bytes currently held waiting for a complete document
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered content, e.g. before reading a fresh connection
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.partial_char.clear();
    }

    /// Best-effort UTF-8 decoding: invalid bytes are skipped, an incomplete
    /// sequence at the end of the chunk is held back for the next one.
    fn append_decoded(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_char);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid) => rest = &after[invalid..],
                        None => {
                            self.partial_char = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    fn truncate(&mut self) {
        let mut cut = self.buffer.len() - RETAINED_ON_TRUNCATE;
        while !self.buffer.is_char_boundary(cut) {
            cut += 1;
        }
        self.buffer.drain(..cut);
        self.truncations += 1;
        self.discarded_bytes += cut as u64;
        warn!(
            "No alert start marker in {} buffered bytes, discarded {} (truncation #{})",
            cut + self.buffer.len(),
            cut,
            self.truncations
        );
    }
}
