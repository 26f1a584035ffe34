//! Fallback update source backed by the fleet simulator.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{interval, MissedTickBehavior};

use super::source::{SourceError, UpdateSource, UpdateStream};
use super::state::SourceKind;
use crate::clock::current_time_ms;
use crate::fleet::FleetSimulator;

pub const DEFAULT_PROXY_COUNT: usize = 12;

pub struct SyntheticSource {
    interval: Duration,
    proxy_count: usize,
    seed: Option<u64>,
}

impl SyntheticSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            proxy_count: DEFAULT_PROXY_COUNT,
            seed: None,
        }
    }

    pub fn with_proxy_count(mut self, proxy_count: usize) -> Self {
        self.proxy_count = proxy_count;
        self
    }

    /// Make the generated fleet reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[async_trait::async_trait]
impl UpdateSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    /// Emits the first envelope immediately, then one per interval, forever.
    async fn open(&self) -> Result<UpdateStream, SourceError> {
        let simulator = FleetSimulator::new(self.proxy_count, self.seed);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stream = stream::unfold((simulator, ticker), |(mut simulator, mut ticker)| async move {
            ticker.tick().await;
            let envelope = simulator.next_envelope(current_time_ms());
            Some((Ok(envelope), (simulator, ticker)))
        });
        Ok(stream.boxed())
    }
}
