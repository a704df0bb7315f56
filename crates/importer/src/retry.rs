//! Backoff between failed importer turns.

use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};

/// Capped exponential delay; retries never give up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms.max(initial_ms)),
        }
    }

    pub(crate) fn backoff(&self) -> Delays {
        Delays {
            max: self.max,
            inner: ExponentialBackoff {
                initial_interval: self.initial,
                current_interval: self.initial,
                max_interval: self.max,
                max_elapsed_time: None,
                ..Default::default()
            },
        }
    }
}

/// Delay sequence of one importer loop.
pub(crate) struct Delays {
    max: Duration,
    inner: ExponentialBackoff,
}

impl Delays {
    pub(crate) fn next_delay(&mut self) -> Duration {
        // Jitter may overshoot max_interval.
        self.inner
            .next_backoff()
            .map_or(self.max, |delay| delay.min(self.max))
    }

    pub(crate) fn reset(&mut self) {
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_stay_capped() {
        let mut delays = RetryPolicy::new(100, 400).backoff();
        let mut last = Duration::ZERO;
        for _ in 0..20 {
            last = delays.next_delay();
            assert!(last <= Duration::from_millis(400));
        }
        assert!(last >= Duration::from_millis(200));
    }

    #[test]
    fn reset_starts_over() {
        let mut delays = RetryPolicy::new(100, 10_000).backoff();
        for _ in 0..10 {
            delays.next_delay();
        }
        delays.reset();
        assert!(delays.next_delay() <= Duration::from_millis(150));
    }

    #[test]
    fn max_is_never_below_initial() {
        assert_eq!(RetryPolicy::new(1000, 10).max, Duration::from_millis(1000));
    }
}
