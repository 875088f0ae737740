//! Reconnect backoff policy.
//!
//! Pure mapping from attempt number to wait duration: `base * 2^attempt`,
//! so with the default one-second base the waits are 2s, 4s, 8s, 16s, 32s.

use std::time::Duration;

/// Attempts allowed before a session is marked permanently disconnected.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Wait duration before reconnect attempt `attempt` (1-based).
pub fn delay(attempt: u32, base: Duration) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

/// Whether the attempt budget is spent.
pub fn exhausted(attempts: u32, max: u32) -> bool {
    attempts >= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_seconds() {
        let base = Duration::from_secs(1);
        let waits: Vec<u64> = (1..=5).map(|a| delay(a, base).as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn scales_with_base() {
        assert_eq!(
            delay(3, Duration::from_millis(10)),
            Duration::from_millis(80)
        );
    }

    #[test]
    fn budget() {
        assert!(!exhausted(4, MAX_RECONNECT_ATTEMPTS));
        assert!(exhausted(5, MAX_RECONNECT_ATTEMPTS));
        assert!(exhausted(6, MAX_RECONNECT_ATTEMPTS));
    }
}
