//! Backoff policy for transient upload failures.
//!
//! Exponential with factor 2 from a 1-second base, capped at the configured
//! upload period, with ±25% jitter to avoid herding when many clients come
//! back online together. At most [`RetryPolicy::max_attempts`] attempts per
//! flush cycle; events are never discarded because retries ran out — the
//! queue is left intact for the next cycle.

use std::time::Duration;

/// Retry schedule for one flush cycle.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// First backoff delay.
    pub base: Duration,
    /// Upper bound for any single delay.
    pub cap: Duration,
    /// Maximum transmission attempts per flush cycle.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Policy capped at the agent's upload period.
    pub fn capped_at(upload_period: Duration) -> Self {
        Self {
            cap: upload_period,
            ..Self::default()
        }
    }

    /// Backoff before the given retry `attempt` (1-based), with jitter.
    ///
    /// Returns `None` once the attempt budget is exhausted.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.cap);

        // ±25% jitter
        let quarter = exp.as_millis() as u64 / 4;
        let jitter = if quarter > 0 {
            rand::random::<u64>() % (quarter * 2 + 1)
        } else {
            0
        };
        let millis = (exp.as_millis() as u64).saturating_sub(quarter) + jitter;
        Some(Duration::from_millis(millis))
    }
}
