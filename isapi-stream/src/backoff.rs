//! Exponential reconnect delay

use std::time::Duration;

/// Doubling delay from `base` up to `cap`, reset to `base` after progress.
///
/// With base 5 s and cap 60 s successive delays are 5, 10, 20, 40, 60, 60...
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        let cap = cap.max(base);
        Self {
            base,
            cap,
            current: base,
        }
    }

    /// Delay to wait now; the following one doubles
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will return
    pub fn peek(&self) -> Duration {
        self.current
    }
}
