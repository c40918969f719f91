//! Circuit breaker (§4.2): closed -> open after 5 consecutive failures, open for 60s,
//! then a single half-open probe decides closed/open again.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    half_open_probe_in_flight: bool,
}

/// One breaker per `(account, resource)` pair, per §4.2.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    consecutive_failures: AtomicU32,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                half_open_probe_in_flight: false,
            }),
            consecutive_failures: AtomicU32::new(0),
            trips: AtomicU64::new(0),
        }
    }

    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Returns `true` if a call may proceed right now (closed, or the lone half-open probe).
    pub fn try_acquire(&self) -> bool {
        let mut guard = self.inner.lock();
        match guard.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = guard.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= OPEN_DURATION {
                    guard.state = CircuitState::HalfOpen;
                    guard.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if guard.half_open_probe_in_flight {
                    false
                } else {
                    guard.half_open_probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut guard = self.inner.lock();
        guard.state = CircuitState::Closed;
        guard.opened_at = None;
        guard.half_open_probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut guard = self.inner.lock();
        if guard.state == CircuitState::HalfOpen {
            // probe failed: back to open for another full cooldown
            guard.state = CircuitState::Open;
            guard.opened_at = Some(Instant::now());
            guard.half_open_probe_in_flight = false;
            self.trips.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= FAILURE_THRESHOLD && guard.state == CircuitState::Closed {
            guard.state = CircuitState::Open;
            guard.opened_at = Some(Instant::now());
            self.trips.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_threshold() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn trips_open_at_threshold() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
        assert_eq!(cb.trips(), 1);
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_allows_single_probe_only() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            cb.record_failure();
        }
        {
            let mut guard = cb.inner.lock();
            guard.opened_at = Some(Instant::now() - OPEN_DURATION - Duration::from_secs(1));
        }
        assert!(cb.try_acquire());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // a second caller must not get a concurrent probe
        assert!(!cb.try_acquire());
    }

    #[test]
    fn failed_probe_reopens_circuit() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            cb.record_failure();
        }
        {
            let mut guard = cb.inner.lock();
            guard.opened_at = Some(Instant::now() - OPEN_DURATION - Duration::from_secs(1));
        }
        assert!(cb.try_acquire());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
