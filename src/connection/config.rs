use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::{BackoffStrategy, ReconnectPolicy};

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8787/v1/fleet/updates";

/// Live-channel settings (`[connection]` in `proxywatch.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: String,
    /// Failed attempts tolerated before the manager gives up on the live channel.
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
    pub fallback_to_mock: bool,
    pub auto_connect: bool,
    /// Bound on a single channel-open attempt. Expiry counts as a failed attempt.
    pub connect_timeout_ms: u64,
    /// Delivery interval of the synthetic generator.
    pub mock_interval_ms: u64,
    pub backoff: BackoffStrategy,
    pub max_backoff_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect_attempts: 5,
            reconnect_interval_ms: 3000,
            fallback_to_mock: true,
            auto_connect: true,
            connect_timeout_ms: 10_000,
            mock_interval_ms: 5000,
            backoff: BackoffStrategy::Fixed,
            max_backoff_ms: 30_000,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn mock_interval(&self) -> Duration {
        Duration::from_millis(self.mock_interval_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let interval = Duration::from_millis(self.reconnect_interval_ms);
        match self.backoff {
            BackoffStrategy::Fixed => ReconnectPolicy::fixed(interval),
            BackoffStrategy::Exponential => {
                ReconnectPolicy::exponential(interval, Duration::from_millis(self.max_backoff_ms))
            }
        }
    }
}
