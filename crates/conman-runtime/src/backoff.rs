//! Bounded exponential backoff with jitter.

use std::time::{Duration, Instant};

use conman_common::config::StartPolicy;
use rand::Rng;

/// Delay sequence for polling a container until it runs.
///
/// Each delay doubles the previous one up to `max_delay`, then a random
/// jitter of up to `jitter * delay` is added or subtracted. The sequence
/// ends once either the delays handed out or the wall-clock time since
/// [`Backoff::new`] would exceed `max_wait`, so time spent between
/// delays counts against the budget too.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: StartPolicy,
    started: Instant,
    next: Duration,
    slept: Duration,
}

impl Backoff {
    /// Starts a new sequence at `policy.initial_delay`. The wall-clock
    /// budget starts now.
    pub fn new(policy: StartPolicy) -> Self {
        Self {
            next: policy.initial_delay,
            policy,
            started: Instant::now(),
            slept: Duration::ZERO,
        }
    }

    /// Returns the next delay, or `None` once the total budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let base = self.next.min(self.policy.max_delay);
        let delay = self.jittered(base);
        let slept = self.slept.checked_add(delay)?;
        let elapsed = self.started.elapsed().checked_add(delay)?;
        if slept > self.policy.max_wait || elapsed > self.policy.max_wait {
            return None;
        }
        self.slept = slept;
        self.next = base.saturating_mul(2);
        Some(delay)
    }

    /// Returns `true` once the wall-clock budget is spent.
    pub fn expired(&self) -> bool {
        self.started.elapsed() > self.policy.max_wait
    }

    /// Wall-clock time since the sequence started.
    pub fn waited(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sum of the delays handed out so far.
    pub const fn slept(&self) -> Duration {
        self.slept
    }

    fn jittered(&self, base: Duration) -> Duration {
        let jitter = self.policy.jitter.clamp(0.0, 1.0);
        if jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::rng().random_range(-jitter..=jitter);
        base.mul_f64(1.0 + factor)
    }
}
