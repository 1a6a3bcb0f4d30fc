//! Retry with capped exponential backoff

use std::future::Future;
use std::time::Duration;

use crate::FetchError;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `retry` (1-based): `base * 2^(retry - 1)`, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Total attempts including the first
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// `op` receives the 0-based attempt number. Only transient errors are
/// retried; the final error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!("attempt {} failed ({}), retrying in {:?}", attempt, err, delay);
                smol::Timer::after(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_secs(10),
        }
    }

    fn transient() -> FetchError {
        FetchError::Status { status: 500, status_text: "Internal Server Error".into() }
    }

    #[test]
    fn test_delay_doubles() {
        let p = policy(5, 100);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let p = RetryPolicy { max_delay: Duration::from_millis(250), ..policy(10, 100) };
        assert_eq!(p.delay_for(3), Duration::from_millis(250));
        assert_eq!(p.delay_for(40), Duration::from_millis(250));
    }

    #[test]
    fn test_exhausts_budget() {
        let calls = Cell::new(0);
        let result: Result<(), _> = smol::block_on(with_retry(&policy(3, 1), |_| {
            calls.set(calls.get() + 1);
            async { Err(transient()) }
        }));

        assert_eq!(result, Err(transient()));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = smol::block_on(with_retry(&policy(3, 1), |_| {
            calls.set(calls.get() + 1);
            async { Err(FetchError::Offline { path: "/".into() }) }
        }));

        assert!(matches!(result, Err(FetchError::Offline { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_recovers_after_backoff() {
        let start = Instant::now();
        let result = smol::block_on(with_retry(&policy(2, 20), |attempt| async move {
            if attempt < 2 { Err(transient()) } else { Ok(attempt) }
        }));

        assert_eq!(result, Ok(2));
        // 20ms + 40ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
