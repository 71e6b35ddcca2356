//! Dispatch rate limiting
//!
//! Two policies behind one trait:
//! - Fixed interval: one dispatch per `interval`
//! - Burst: a ring of the last `k` dispatch times; a dispatch is allowed once
//!   the oldest slot is at least `interval` old
//!
//! Slots that have never been used count as infinitely old, so a fresh limiter
//! permits immediately.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

pub trait DispatchLimiter: Send {
    /// Whether a dispatch may happen at `now`
    fn permits(&self, now: Instant) -> bool;

    /// Record that a dispatch happened at `now`
    fn record(&mut self, now: Instant);
}

fn elapsed_at_least(slot: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match slot {
        Some(at) => now.saturating_duration_since(at) >= interval,
        None => true,
    }
}

#[derive(Debug, Clone)]
pub struct FixedIntervalLimiter {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl FixedIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }
}

impl DispatchLimiter for FixedIntervalLimiter {
    fn permits(&self, now: Instant) -> bool {
        elapsed_at_least(self.last_dispatch, now, self.interval)
    }

    fn record(&mut self, now: Instant) {
        self.last_dispatch = Some(now);
    }
}

#[derive(Debug, Clone)]
pub struct BurstLimiter {
    interval: Duration,
    slots: Vec<Option<Instant>>,
    oldest: usize,
}

impl BurstLimiter {
    pub fn new(interval: Duration, burst: usize) -> Self {
        Self {
            interval,
            slots: vec![None; burst.max(1)],
            oldest: 0,
        }
    }
}

impl DispatchLimiter for BurstLimiter {
    fn permits(&self, now: Instant) -> bool {
        elapsed_at_least(self.slots[self.oldest], now, self.interval)
    }

    fn record(&mut self, now: Instant) {
        self.slots[self.oldest] = Some(now);
        self.oldest = (self.oldest + 1) % self.slots.len();
    }
}

/// Build a fresh limiter for the configured policy
pub fn limiter_for(config: &RateLimitConfig) -> Box<dyn DispatchLimiter> {
    match *config {
        RateLimitConfig::FixedInterval { interval_ms } => {
            Box::new(FixedIntervalLimiter::new(Duration::from_millis(interval_ms)))
        }
        RateLimitConfig::Burst { interval_ms, burst } => {
            Box::new(BurstLimiter::new(Duration::from_millis(interval_ms), burst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_fixed_interval() {
        let start = Instant::now();
        let mut limiter = FixedIntervalLimiter::new(SECOND);

        assert!(limiter.permits(start));
        limiter.record(start);

        assert!(!limiter.permits(start));
        assert!(!limiter.permits(start + Duration::from_millis(999)));
        assert!(limiter.permits(start + SECOND));
    }

    #[test]
    fn test_burst_allows_k_then_throttles() {
        let start = Instant::now();
        let mut limiter = BurstLimiter::new(SECOND, 2);

        assert!(limiter.permits(start));
        limiter.record(start);
        assert!(limiter.permits(start));
        limiter.record(start + Duration::from_millis(100));

        // Both slots used within the window
        assert!(!limiter.permits(start + Duration::from_millis(500)));

        // Oldest slot (t=0) ages out first
        assert!(limiter.permits(start + SECOND));
        limiter.record(start + SECOND);

        // Next oldest is t=100ms
        assert!(!limiter.permits(start + Duration::from_millis(1099)));
        assert!(limiter.permits(start + Duration::from_millis(1100)));
    }

    #[test]
    fn test_burst_of_one_matches_fixed_interval() {
        let start = Instant::now();
        let mut burst = BurstLimiter::new(SECOND, 1);
        let mut fixed = FixedIntervalLimiter::new(SECOND);

        for offset_ms in [0u64, 400, 1000, 1500, 2000, 2999, 3000] {
            let now = start + Duration::from_millis(offset_ms);
            assert_eq!(burst.permits(now), fixed.permits(now), "offset {}", offset_ms);
            if fixed.permits(now) {
                burst.record(now);
                fixed.record(now);
            }
        }
    }

    #[test]
    fn test_zero_burst_treated_as_one() {
        let start = Instant::now();
        let mut limiter = BurstLimiter::new(SECOND, 0);
        limiter.record(start);
        assert!(!limiter.permits(start));
    }
}
