//! Capped exponential backoff for retrying a single failed upload.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Extra attempts after the first one
    pub retries: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(8),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Delay before retry number `retry` (1-based), or `None` when exhausted.
    pub fn delay(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.retries {
            return None;
        }
        let factor = 2u32.saturating_pow(retry - 1);
        Some(self.initial.saturating_mul(factor).min(self.max))
    }
}
