//! Retry delay schedule.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base * attempt`,
/// capped. Non-decreasing in `attempt`.
#[must_use]
pub fn delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    base.saturating_mul(attempt.max(1)).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_caps() {
        let base = Duration::from_secs(2);
        let cap = Duration::from_secs(60);
        let delays: Vec<_> = (1..=40).map(|n| delay(n, base, cap)).collect();
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0], "delays must be non-decreasing");
        }
        assert_eq!(delays[0], Duration::from_secs(2));
        assert_eq!(*delays.last().unwrap(), cap);
    }

    #[test]
    fn zero_attempt_still_waits() {
        assert_eq!(
            delay(0, Duration::from_secs(2), Duration::from_secs(60)),
            Duration::from_secs(2)
        );
    }
}
