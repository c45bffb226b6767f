//! Retry policy for server-class HTTP failures.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Default number of retries after the initial attempt.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff factor (0.25s).
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Statuses retried by default.
const DEFAULT_RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Upper bound for any single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Bounded exponential-backoff retry policy.
///
/// Retry `n` (1-based) waits `backoff * 2^(n-1)`, except the first retry
/// which is immediate, capped at 120s. With the default 250ms factor the
/// schedule is 0s, 0.5s, 1s, 2s, 4s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
    statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff: Duration, statuses: Vec<u16>) -> Self {
        Self {
            max_retries,
            backoff,
            statuses,
        }
    }

    /// Maximum number of retries after the initial attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff factor.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Statuses that trigger a retry.
    #[must_use]
    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }

    /// Returns `true` if `status` should be retried.
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Delay requested by a `Retry-After: <seconds>` header, capped.
    pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
    }
}
