use std::time::Duration;

/// Bounded retry for rate-limited operations.
///
/// Attempts are counted explicitly; once `max_attempts` have been made the
/// caller gives up instead of waiting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait used when the upstream gives no retry-after hint.
    pub fallback_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            fallback_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            fallback_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based), or `None`
    /// when the attempt budget is spent.
    pub fn next_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(retry_after.unwrap_or(self.fallback_delay))
    }
}
