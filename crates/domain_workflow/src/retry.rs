//! Exponential backoff for transient stage failures

use std::time::Duration;

/// Capped exponential backoff: `base * 2^(attempt - 1)`, attempt >= 1
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before the given attempt may be retried
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1u32 << shift);
        delay.min(self.cap)
    }
}
