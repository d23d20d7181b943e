//! Reconnect backoff.
//!
//! The wait and the growth of the next duration are computed separately:
//! each wait is the current duration plus a jittered copy of it (capped at
//! one minute), while the duration itself only doubles until it reaches
//! the growth limit and then stays pinned there.

use std::time::Duration;

use rand::Rng;

use crate::constants::{BACKOFF_BASE, BACKOFF_GROWTH_LIMIT, BACKOFF_JITTER, BACKOFF_MAX_WAIT};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    current: Duration,
    max_wait: Duration,
    growth_limit: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_MAX_WAIT, BACKOFF_GROWTH_LIMIT)
    }
}

impl Backoff {
    pub fn new(base: Duration, max_wait: Duration, growth_limit: Duration) -> Self {
        Self {
            base,
            current: base,
            max_wait,
            growth_limit,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Back to the base duration after a clean connect.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Wait for the next failed attempt, drawing jitter from `rng`.
    pub fn next_wait<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let jitter = rng.gen_range(0.0..BACKOFF_JITTER);
        self.next_wait_with_jitter(jitter)
    }

    /// Same as [`next_wait`](Self::next_wait) with a fixed jitter fraction.
    pub fn next_wait_with_jitter(&mut self, jitter: f64) -> Duration {
        let wait = (self.current + self.current.mul_f64(1.0 + jitter)).min(self.max_wait);

        if self.current < self.growth_limit {
            self.current *= 2;
        }
        wait
    }
}
