use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 20;

type DirectLimiter<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

// Evenly spaced, no burst: at most `requests` in any 60 s window.
pub struct SessionPacer<C: Clock = DefaultClock> {
    label: &'static str,
    limiter: DirectLimiter<C>,
    clock: C,
}

impl SessionPacer<DefaultClock> {
    pub fn per_minute(label: &'static str, requests: u32) -> Self {
        Self::with_clock(label, requests, DefaultClock::default())
    }
}

impl<C: Clock> SessionPacer<C> {
    pub fn with_clock(label: &'static str, requests: u32, clock: C) -> Self {
        let requests = NonZeroU32::new(requests.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(requests).allow_burst(NonZeroU32::MIN);
        let limiter = RateLimiter::direct_with_clock(quota, &clock);
        Self {
            label,
            limiter,
            clock,
        }
    }

    pub fn try_acquire(&self) -> Option<Duration> {
        match self.limiter.check() {
            Ok(()) => None,
            Err(not_until) => Some(not_until.wait_time_from(self.clock.now())),
        }
    }

    pub fn pace(&self) {
        while let Some(wait) = self.try_acquire() {
            debug!(session = self.label, wait_ms = wait.as_millis() as u64, "pacing request");
            std::thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use governor::clock::FakeRelativeClock;

    use super::*;

    #[test]
    fn requests_are_spaced_evenly() {
        let clock = FakeRelativeClock::default();
        let pacer = SessionPacer::with_clock("batting", 20, clock.clone());

        assert!(pacer.try_acquire().is_none());
        let wait = pacer.try_acquire().expect("second request must wait");
        assert!(wait > Duration::from_millis(2900) && wait <= Duration::from_secs(3));

        clock.advance(wait);
        assert!(pacer.try_acquire().is_none());
    }

    #[test]
    fn one_minute_never_holds_more_than_the_ceiling() {
        let clock = FakeRelativeClock::default();
        let pacer = SessionPacer::with_clock("batting", 20, clock.clone());

        let mut granted = 0;
        let mut elapsed = Duration::ZERO;
        while elapsed < Duration::from_secs(60) {
            match pacer.try_acquire() {
                None => granted += 1,
                Some(wait) => {
                    clock.advance(wait);
                    elapsed += wait;
                }
            }
        }
        assert_eq!(granted, 20);
    }

    #[test]
    fn zero_ceiling_is_clamped_to_one() {
        let clock = FakeRelativeClock::default();
        let pacer = SessionPacer::with_clock("pitching", 0, clock);
        assert!(pacer.try_acquire().is_none());
        assert!(pacer.try_acquire().is_some());
    }
}
