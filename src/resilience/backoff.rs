//! Jittered exponential delays, shared by caller retries and subscription
//! reconnects.

use rand::Rng;
use std::time::Duration;

/// Delay bounds of a retry schedule.
///
/// Implementors only supply the bounds; [`delay_for`](Backoff::delay_for)
/// doubles from the base up to the ceiling and adds up to 10% jitter so
/// clients that failed together do not come back together.
pub trait Backoff {
    fn base_delay(&self) -> Duration;
    fn max_delay(&self) -> Duration;

    /// Wait before retry `attempt` (1-based). Attempt 0 waits nothing.
    fn delay_for(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let ceiling = self.max_delay();
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        let delay = self
            .base_delay()
            .checked_mul(factor)
            .map_or(ceiling, |d| d.min(ceiling));

        let jitter_ms = delay.as_millis() as u64 / 10;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bounds(u64, u64);

    impl Backoff for Bounds {
        fn base_delay(&self) -> Duration {
            Duration::from_millis(self.0)
        }
        fn max_delay(&self) -> Duration {
            Duration::from_millis(self.1)
        }
    }

    #[test]
    fn test_doubles_up_to_ceiling() {
        let bounds = Bounds(100, 1_000);
        assert_eq!(bounds.delay_for(0), Duration::ZERO);

        let first = bounds.delay_for(1).as_millis();
        assert!((100..110).contains(&first));
        let third = bounds.delay_for(3).as_millis();
        assert!((400..440).contains(&third));
        let capped = bounds.delay_for(10).as_millis();
        assert!((1_000..1_100).contains(&capped));
    }

    #[test]
    fn test_huge_attempt_saturates_at_ceiling() {
        let delay = Bounds(1_000, 30_000).delay_for(u32::MAX);
        assert!(delay >= Duration::from_secs(30) && delay < Duration::from_secs(33));
    }

    #[test]
    fn test_short_delays_carry_no_jitter() {
        assert_eq!(Bounds(5, 5).delay_for(4), Duration::from_millis(5));
    }
}
