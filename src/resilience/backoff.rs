//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Doubling delay, capped, plus up to 10% random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 waits zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u64.saturating_pow(attempt - 1);
        let capped = self.base_ms.saturating_mul(factor).min(self.max_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(100, 5_000)
    }
}
