use std::time::Duration;

use crate::TransportError;

/// Per-request retry bookkeeping.
///
/// A fresh value is created for every call to
/// [`crate::RetryingHttpClient::request`] and replaced, never mutated, after
/// each failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RetryState {
    /// Zero-based number of the attempt currently being executed.
    pub attempts: u32,
    /// Delay in milliseconds to wait before the next attempt.
    pub retry_delay_ms: u64,
    /// Total attempts allowed; `0` means unbounded.
    pub max_attempts: u32,
}

impl RetryState {
    /// State before the first attempt.
    pub(crate) fn new(retry_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            retry_delay_ms,
            max_attempts,
        }
    }

    /// Whether another attempt may follow the one that just failed.
    ///
    /// The check runs against the upcoming attempt number, so a cap of `n`
    /// allows exactly `n` sends.
    pub(crate) fn can_retry(&self) -> bool {
        self.max_attempts == 0 || self.attempts.saturating_add(1) < self.max_attempts
    }

    /// State for the attempt following `failure`.
    ///
    /// The delay doubles after a `429` and is kept otherwise.
    pub(crate) fn next(&self, failure: &TransportError) -> Self {
        let retry_delay_ms = if failure.is_rate_limited() {
            self.retry_delay_ms.saturating_mul(2)
        } else {
            self.retry_delay_ms
        };

        Self {
            attempts: self.attempts.saturating_add(1),
            retry_delay_ms,
            max_attempts: self.max_attempts,
        }
    }

    /// Delay to wait before the attempt following the current one.
    pub(crate) fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
