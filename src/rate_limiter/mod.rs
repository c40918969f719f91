//! Per-resource sliding-window rate limiter (C1, §4.1).
//!
//! Two independent windows (1s, 60s) are tracked per `(account, resource_class)`.
//! `acquire` blocks the caller until admitting one more request would not violate
//! either cap. The window-state mutex is held only for the bookkeeping itself —
//! never across the sleep — matching §5's "critical sections hold no I/O" rule.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::models::product::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Orders,
    Other,
}

impl ResourceClass {
    pub fn default_per_second_cap(&self) -> u32 {
        match self {
            ResourceClass::Orders => 12,
            ResourceClass::Other => 3,
        }
    }

    pub fn default_per_minute_cap(&self) -> u32 {
        match self {
            ResourceClass::Orders => 720,
            ResourceClass::Other => 180,
        }
    }
}

/// Per-`(account, resource_class)` override, since the spec leaves limits for
/// marketplaces other than the two principal accounts unspecified (§9 open question).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSpec {
    pub per_second: u32,
    pub per_minute: u32,
}

impl From<ResourceClass> for RateLimitSpec {
    fn from(class: ResourceClass) -> Self {
        Self {
            per_second: class.default_per_second_cap(),
            per_minute: class.default_per_minute_cap(),
        }
    }
}

/// Injected jitter source so tests can be deterministic (§4.2 "determinism").
pub trait JitterSource: Send + Sync {
    fn jitter(&self, max: Duration) -> Duration;
}

pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let frac: f64 = rand::random();
        Duration::from_secs_f64(max.as_secs_f64() * frac)
    }
}

pub struct NoJitter;

impl JitterSource for NoJitter {
    fn jitter(&self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

#[derive(Default)]
struct Window {
    per_second: VecDeque<Instant>,
    per_minute: VecDeque<Instant>,
}

impl Window {
    fn evict(&mut self, now: Instant) {
        while let Some(&front) = self.per_second.front() {
            if now.duration_since(front) >= Duration::from_secs(1) {
                self.per_second.pop_front();
            } else {
                break;
            }
        }
        while let Some(&front) = self.per_minute.front() {
            if now.duration_since(front) >= Duration::from_secs(60) {
                self.per_minute.pop_front();
            } else {
                break;
            }
        }
    }
}

/// §4.1 Observability counters.
#[derive(Default)]
pub struct RateLimiterMetrics {
    pub admitted: AtomicU64,
    pub waited: AtomicU64,
    pub cumulative_wait_nanos: AtomicU64,
    pub current_waiters: AtomicUsize,
    pub max_concurrent_waiters: AtomicUsize,
}

impl RateLimiterMetrics {
    pub fn cumulative_wait(&self) -> Duration {
        Duration::from_nanos(self.cumulative_wait_nanos.load(Ordering::Relaxed))
    }
}

pub struct RateLimiter {
    windows: DashMap<(Account, ResourceClass), Arc<Mutex<Window>>>,
    specs: DashMap<(Account, ResourceClass), RateLimitSpec>,
    jitter: Arc<dyn JitterSource>,
    metrics: Arc<RateLimiterMetrics>,
}

impl RateLimiter {
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            windows: DashMap::new(),
            specs: DashMap::new(),
            jitter,
            metrics: Arc::new(RateLimiterMetrics::default()),
        }
    }

    pub fn with_default_jitter() -> Self {
        Self::new(Arc::new(RandomJitter))
    }

    pub fn metrics(&self) -> Arc<RateLimiterMetrics> {
        self.metrics.clone()
    }

    pub fn configure(&self, account: Account, class: ResourceClass, spec: RateLimitSpec) {
        self.specs.insert((account, class), spec);
    }

    fn spec_for(&self, account: Account, class: ResourceClass) -> RateLimitSpec {
        self.specs.get(&(account, class)).map(|s| *s).unwrap_or_else(|| class.into())
    }

    /// Blocks until admitting one more request would not violate either window cap.
    pub async fn acquire(&self, account: Account, class: ResourceClass) {
        let spec = self.spec_for(account, class);
        let window = self
            .windows
            .entry((account, class))
            .or_insert_with(|| Arc::new(Mutex::new(Window::default())))
            .clone();

        let mut waited_once = false;
        loop {
            let wait_for = {
                let mut guard = window.lock();
                let now = Instant::now();
                guard.evict(now);

                let sec_full = guard.per_second.len() as u32 >= spec.per_second;
                let min_full = guard.per_minute.len() as u32 >= spec.per_minute;

                if !sec_full && !min_full {
                    guard.per_second.push_back(now);
                    guard.per_minute.push_back(now);
                    self.metrics.admitted.fetch_add(1, Ordering::Relaxed);
                    None
                } else {
                    let sec_wait = guard
                        .per_second
                        .front()
                        .map(|t| Duration::from_secs(1).saturating_sub(now.duration_since(*t)));
                    let min_wait = guard
                        .per_minute
                        .front()
                        .map(|t| Duration::from_secs(60).saturating_sub(now.duration_since(*t)));
                    let wait = match (sec_full, min_full) {
                        (true, true) => sec_wait.max(min_wait),
                        (true, false) => sec_wait,
                        (false, true) => min_wait,
                        (false, false) => unreachable!(),
                    };
                    Some(wait.unwrap_or(Duration::from_millis(1)).max(Duration::from_millis(1)))
                }
            };

            match wait_for {
                None => {
                    if waited_once {
                        self.metrics.current_waiters.fetch_sub(1, Ordering::Relaxed);
                    }
                    let jitter = self.jitter.jitter(Duration::from_millis(100));
                    if !jitter.is_zero() {
                        tokio::time::sleep(jitter).await;
                    }
                    return;
                }
                Some(duration) => {
                    if !waited_once {
                        self.metrics.waited.fetch_add(1, Ordering::Relaxed);
                        let n = self.metrics.current_waiters.fetch_add(1, Ordering::Relaxed) + 1;
                        self.metrics.max_concurrent_waiters.fetch_max(n, Ordering::Relaxed);
                        waited_once = true;
                    }
                    self.metrics
                        .cumulative_wait_nanos
                        .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_per_second_cap_without_waiting() {
        let limiter = RateLimiter::new(Arc::new(NoJitter));
        limiter.configure(
            Account::Main,
            ResourceClass::Other,
            RateLimitSpec { per_second: 3, per_minute: 180 },
        );

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(Account::Main, ResourceClass::Other).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.metrics().admitted.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn blocks_once_per_second_cap_is_hit() {
        let limiter = RateLimiter::new(Arc::new(NoJitter));
        limiter.configure(
            Account::Main,
            ResourceClass::Other,
            RateLimitSpec { per_second: 2, per_minute: 1000 },
        );

        limiter.acquire(Account::Main, ResourceClass::Other).await;
        limiter.acquire(Account::Main, ResourceClass::Other).await;

        let start = Instant::now();
        limiter.acquire(Account::Main, ResourceClass::Other).await;
        // third call must have waited roughly until the 1s window freed up
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(limiter.metrics().waited.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn accounts_and_classes_are_independent() {
        let limiter = RateLimiter::new(Arc::new(NoJitter));
        limiter.configure(
            Account::Main,
            ResourceClass::Other,
            RateLimitSpec { per_second: 1, per_minute: 1 },
        );
        limiter.acquire(Account::Main, ResourceClass::Other).await;

        // fbe's bucket for the same class must be untouched
        let start = Instant::now();
        limiter.acquire(Account::Fbe, ResourceClass::Other).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
