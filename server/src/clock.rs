//! Server time source
//!
//! Event timestamps are Unix milliseconds, but they are derived from a
//! monotonic instant captured at startup. A system clock step after startup
//! therefore cannot stretch or shorten projectile lifetimes, and a deadline
//! in clock milliseconds maps back to an exact timer instant.

use shared::now_millis;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    origin: Instant,
    origin_millis: u64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_millis: now_millis(),
        }
    }

    /// Current time in Unix milliseconds, never decreasing
    pub fn now(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_millis.saturating_add(elapsed)
    }

    /// Timer instant at which [`ServerClock::now`] reaches `millis`
    pub fn instant_at(&self, millis: u64) -> Instant {
        self.origin + Duration::from_millis(millis.saturating_sub(self.origin_millis))
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_follows_timer_not_wall_clock() {
        tokio::time::pause();
        let clock = ServerClock::new();
        let start = clock.now();

        tokio::time::advance(Duration::from_millis(3000)).await;
        assert_eq!(clock.now(), start + 3000);
    }

    #[tokio::test]
    async fn test_instant_at_round_trips_deadline() {
        tokio::time::pause();
        let clock = ServerClock::new();
        let deadline = clock.now() + 3000;

        assert_eq!(clock.instant_at(deadline) - Instant::now(), Duration::from_millis(3000));
        tokio::time::sleep_until(clock.instant_at(deadline)).await;
        assert!(clock.now() >= deadline);
    }

    #[test]
    fn test_deadline_in_the_past_is_immediate() {
        let clock = ServerClock::new();
        assert!(clock.instant_at(0) <= Instant::now());
    }
}
