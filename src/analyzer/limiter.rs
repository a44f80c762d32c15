//! Proactive token-rate limiting shared by every orchestrator.
//!
//! A governor token bucket sized to the per-minute budget. Callers reserve
//! an estimated token cost before each request and block until the bucket
//! has room, instead of firing and collecting a 429.

use super::cancel::CancellationToken;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Bucket};
use std::num::NonZeroU32;
use std::time::Duration;

/// Longest single sleep while waiting for budget.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Thread-safe token budget refilled continuously over the window.
pub struct RateLimiter {
    capacity: NonZeroU32,
    clock: DefaultClock,
    bucket: Bucket<NotKeyed, InMemoryState, DefaultClock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

fn to_cells(tokens: usize) -> NonZeroU32 {
    let clamped = u32::try_from(tokens).unwrap_or(u32::MAX).max(1);
    NonZeroU32::new(clamped).unwrap_or(NonZeroU32::MIN)
}

impl RateLimiter {
    /// Bucket of `tokens_per_window` that refills fully over `window`.
    pub fn new(tokens_per_window: usize, window: Duration) -> Self {
        let capacity = to_cells(tokens_per_window);
        let period = (window / capacity.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_minute(capacity))
            .allow_burst(capacity);
        Self::with_quota(capacity, quota)
    }

    /// Limiter with a one-minute window.
    pub fn per_minute(tokens_per_minute: usize) -> Self {
        let capacity = to_cells(tokens_per_minute);
        Self::with_quota(capacity, Quota::per_minute(capacity))
    }

    fn with_quota(capacity: NonZeroU32, quota: Quota) -> Self {
        let clock = DefaultClock::default();
        let bucket = Bucket::direct_with_clock(quota, &clock);
        Self {
            capacity,
            clock,
            bucket,
        }
    }

    pub fn tokens_per_window(&self) -> usize {
        self.capacity.get() as usize
    }

    /// Reserve `tokens` now if the bucket allows it.
    ///
    /// On refusal returns how long until the reservation would fit. A
    /// request larger than the whole budget is admitted once the bucket is
    /// full, and drains it, so it cannot block forever.
    pub fn try_acquire(&self, tokens: usize) -> Result<(), Duration> {
        let cells = to_cells(tokens);
        let outcome = match self.bucket.check_n(cells) {
            Ok(outcome) => outcome,
            // Oversized: take the full bucket instead.
            Err(_) => self
                .bucket
                .check_n(self.capacity)
                .unwrap_or_else(|_| Ok(())),
        };
        outcome.map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Block until `tokens` fit in the bucket.
    ///
    /// Returns false if `cancel` fired while waiting.
    pub fn acquire(&self, tokens: usize, cancel: &CancellationToken) -> bool {
        let mut logged = false;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            match self.try_acquire(tokens) {
                Ok(()) => return true,
                Err(wait) => {
                    if !logged {
                        tracing::debug!(
                            tokens,
                            wait_ms = wait.as_millis() as u64,
                            "Rate budget exhausted, waiting"
                        );
                        logged = true;
                    }
                    std::thread::sleep(wait.clamp(Duration::from_millis(1), POLL_SLICE));
                }
            }
        }
    }
}
