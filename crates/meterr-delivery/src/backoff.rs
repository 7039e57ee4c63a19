// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff.

use std::time::Duration;

/// `base * 2^(retry - 1)`, never more than `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Wait before the next attempt of an entry that has failed `retry`
    /// times. Zero failures means no wait.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Backoff {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(300))
    }

    #[test]
    fn doubles_per_retry() {
        let b = policy();
        assert_eq!(b.delay(0), Duration::ZERO);
        assert_eq!(b.delay(1), Duration::from_secs(1));
        assert_eq!(b.delay(2), Duration::from_secs(2));
        assert_eq!(b.delay(3), Duration::from_secs(4));
        assert_eq!(b.delay(9), Duration::from_secs(256));
    }

    #[test]
    fn is_capped() {
        let b = policy();
        assert_eq!(b.delay(10), Duration::from_secs(300));
        assert_eq!(b.delay(40), Duration::from_secs(300));
        assert_eq!(b.delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn never_decreases() {
        let b = Backoff::new(Duration::from_millis(250), Duration::from_secs(60));
        let delays: Vec<_> = (0..64).map(|r| b.delay(r)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }
}
