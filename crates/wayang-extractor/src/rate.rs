//! Rate gates for external model calls
//!
//! Pacing lives behind [`RateGate`] so extraction logic never sleeps
//! inline and tests can run without real delays.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Source of permits for outbound calls
#[async_trait]
pub trait RateGate: Send + Sync {
    /// Wait until the next call may proceed
    async fn acquire(&self);
}

/// Fixed-interval gate: at most one call per period
pub struct IntervalGate {
    limiter: DirectRateLimiter,
}

impl IntervalGate {
    /// One permit per `interval`; a zero interval does not throttle
    pub fn new(interval: Duration) -> Self {
        let quota =
            Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self::with_quota(quota)
    }

    /// Gate with a custom quota
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Create from a millisecond interval
    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }
}

#[async_trait]
impl RateGate for IntervalGate {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// Gate that never waits; counts permits handed out
#[derive(Debug, Default)]
pub struct Unthrottled {
    acquired: AtomicUsize,
}

impl Unthrottled {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits handed out so far
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RateGate for Unthrottled {
    async fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_unthrottled_counts() {
        let gate = Unthrottled::new();
        gate.acquire().await;
        gate.acquire().await;
        assert_eq!(gate.acquired(), 2);
    }

    #[tokio::test]
    async fn test_interval_gate_first_permit_is_immediate() {
        let gate = IntervalGate::new(Duration::from_secs(3600));
        let started = Instant::now();
        gate.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_interval_gate_paces_calls() {
        let gate = IntervalGate::from_millis(50);
        gate.acquire().await;

        let started = Instant::now();
        gate.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_interval_gate_zero_interval_never_waits() {
        let gate = IntervalGate::from_millis(0);
        let started = Instant::now();
        for _ in 0..100 {
            gate.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(200));
    }
}
