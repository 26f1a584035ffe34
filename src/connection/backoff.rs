use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff strategy between reconnect attempts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Fixed delay of `reconnect_interval` between attempts
    #[default]
    Fixed,
    /// Exponential backoff with jitter: delay = min(interval * 2^attempt + jitter, max)
    Exponential,
}

/// Reconnect delay policy
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    pub strategy: BackoffStrategy,
    pub interval: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            interval: Duration::from_millis(3000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            interval,
            max_delay: interval,
        }
    }

    pub fn exponential(base: Duration, max_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            interval: base,
            max_delay,
        }
    }

    /// Calculate delay before the retry that follows failed attempt number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.interval,
            BackoffStrategy::Exponential => {
                let base_ms = self.interval.as_millis() as u64;
                let max_ms = self.max_delay.as_millis() as u64;
                let base = base_ms.saturating_mul(2_u64.saturating_pow(attempt));
                let jitter = random_jitter(base / 2);
                Duration::from_millis(base.saturating_add(jitter).min(max_ms))
            }
        }
    }
}

/// Generate random jitter up to max_jitter
fn random_jitter(max_jitter: u64) -> u64 {
    if max_jitter == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max_jitter)
}

/// Trait for errors that may be retryable
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
