use crate::transport::{Result, TransportError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 11;

/// Bounded retry with exponential backoff.
///
/// `initial_backoff` of zero retries immediately, with no delay between
/// attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Draw each delay uniformly from `[backoff / 2, backoff]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Un-jittered delay after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self.initial_backoff.saturating_mul(1u32 << exponent);
        scaled.min(self.max_backoff)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for(attempt);
        if !self.jitter || backoff.is_zero() {
            return backoff;
        }
        let high = backoff.as_millis() as u64;
        let low = high / 2;
        Duration::from_millis(rand::rng().random_range(low..=high))
    }
}

/// Run `operation` until it succeeds, the attempts run out, or `cancel` fires.
///
/// When the attempts run out the last underlying error is returned.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            outcome = operation() => outcome,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(TransportError::Cancelled) => return Err(TransportError::Cancelled),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!(
                request = %label,
                attempts = attempt,
                error = %error,
                "All retries have failed"
            );
            return Err(error);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            request = %label,
            attempt = attempt,
            backoff_ms = delay.as_millis(),
            error = %error,
            "Request failed, retrying"
        );

        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failure() -> TransportError {
        TransportError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 11,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            jitter: false,
        };

        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };

        for attempt in 1..6 {
            let delay = policy.delay_for(attempt);
            let backoff = policy.backoff_for(attempt);
            assert!(delay <= backoff);
            assert!(delay >= backoff / 2 - Duration::from_millis(1));
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(DEFAULT_MAX_ATTEMPTS);

        let result: Result<()> = with_retry(&policy, &CancellationToken::new(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure()) }
        })
        .await;

        assert!(matches!(result, Err(TransportError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);

        let result = with_retry(&policy, &CancellationToken::new(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(failure())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let policy = RetryPolicy {
            max_attempts: 11,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            jitter: false,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: Result<()> =
            with_retry(&policy, &cancel, "test", || async { Err(failure()) }).await;

        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
