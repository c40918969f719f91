//! Exponential backoff with injected jitter (§4.2). All randomness is injected so that
//! retry timing is deterministic under test.

use std::time::Duration;

use rand::Rng;

use crate::error::ErrorKind;

pub trait BackoffRng: Send + Sync {
    /// Uniform sample in `[0.0, 1.0)`.
    fn sample(&self) -> f64;
}

pub struct ThreadRng;

impl BackoffRng for ThreadRng {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

pub struct FixedRng(pub f64);

impl BackoffRng for FixedRng {
    fn sample(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// §7: an error kind is worth retrying at all only if it's in the retryable set.
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        kind.is_retryable() && attempt < self.max_attempts
    }

    /// Full jitter: `uniform(0, min(max_delay, base_delay * 2^attempt))`.
    pub fn delay_for(&self, attempt: u32, rng: &dyn BackoffRng) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.max_delay.as_millis());
        let capped_ms = capped as u64;
        let jittered_ms = (capped_ms as f64 * rng.sample()) as u64;
        Duration::from_millis(jittered_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_retryable_kinds() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(ErrorKind::Network, 0));
        assert!(policy.should_retry(ErrorKind::Timeout, 0));
        assert!(policy.should_retry(ErrorKind::RateLimited, 0));
        assert!(!policy.should_retry(ErrorKind::Auth, 0));
        assert!(!policy.should_retry(ErrorKind::RemoteValidation, 0));
    }

    #[test]
    fn stops_retrying_after_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ErrorKind::Network, policy.max_attempts));
    }

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = RetryPolicy::default();
        let full = FixedRng(1.0);
        assert_eq!(policy.delay_for(0, &full), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, &full), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, &full), Duration::from_millis(4000));
        // attempt large enough that 2^attempt*base would exceed max_delay
        assert_eq!(policy.delay_for(10, &full), policy.max_delay);
    }

    #[test]
    fn zero_jitter_gives_zero_delay() {
        let policy = RetryPolicy::default();
        let none = FixedRng(0.0);
        assert_eq!(policy.delay_for(3, &none), Duration::ZERO);
    }
}
