//! Routes update envelopes into the cache under fixed keys and exposes the
//! cached fleet view to readers.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::SharedCache;
use crate::connection::UpdateHandler;
use crate::fleet::{FleetStats, HealthCheck, ProxyStatus, UpdateEnvelope};

pub const PROXIES_KEY: &str = "proxies";
pub const STATS_KEY: &str = "stats";
pub const HEALTH_CHECKS_KEY: &str = "healthChecks";

/// Everything the dispatcher exposes, in one read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub proxies: Vec<ProxyStatus>,
    pub stats: Option<FleetStats>,
    pub health_checks: Vec<HealthCheck>,
    pub last_update: Option<UpdateEnvelope>,
    pub update_count: u64,
}

#[derive(Default)]
struct Progress {
    update_count: u64,
    last_update: Option<UpdateEnvelope>,
}

/// Sole writer of the `proxies`, `stats` and `healthChecks` keys of its cache.
pub struct UpdateDispatcher {
    cache: SharedCache<Value>,
    progress: Mutex<Progress>,
}

impl UpdateDispatcher {
    pub fn new(cache: SharedCache<Value>) -> Self {
        Self {
            cache,
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn cache(&self) -> &SharedCache<Value> {
        &self.cache
    }

    /// Write each collection present in the envelope, replacing the prior value.
    pub async fn apply(&self, envelope: &UpdateEnvelope) {
        let payload = &envelope.payload;
        let mut writes: Vec<(&str, Result<Value, serde_json::Error>)> = Vec::with_capacity(3);
        if let Some(proxies) = &payload.proxies {
            writes.push((PROXIES_KEY, serde_json::to_value(proxies)));
        }
        if let Some(stats) = &payload.stats {
            writes.push((STATS_KEY, serde_json::to_value(stats)));
        }
        if let Some(checks) = &payload.health_checks {
            writes.push((HEALTH_CHECKS_KEY, serde_json::to_value(checks)));
        }

        {
            let mut cache = self.cache.lock().await;
            for (key, value) in writes {
                match value {
                    Ok(value) => cache.set(key, value),
                    Err(e) => warn!(key, error = %e, "failed to encode update collection"),
                }
            }
        }

        let mut progress = self.progress.lock();
        progress.update_count += 1;
        progress.last_update = Some(envelope.clone());
        debug!(
            kind = envelope.kind.as_str(),
            update_count = progress.update_count,
            "update dispatched"
        );
    }

    pub async fn proxies(&self) -> Option<Vec<ProxyStatus>> {
        self.read(PROXIES_KEY).await
    }

    pub async fn stats(&self) -> Option<FleetStats> {
        self.read(STATS_KEY).await
    }

    pub async fn health_checks(&self) -> Option<Vec<HealthCheck>> {
        self.read(HEALTH_CHECKS_KEY).await
    }

    pub fn last_update(&self) -> Option<UpdateEnvelope> {
        self.progress.lock().last_update.clone()
    }

    pub fn update_count(&self) -> u64 {
        self.progress.lock().update_count
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        let proxies = self.proxies().await.unwrap_or_default();
        let stats = self.stats().await;
        let health_checks = self.health_checks().await.unwrap_or_default();
        let progress = self.progress.lock();
        FleetSnapshot {
            proxies,
            stats,
            health_checks,
            last_update: progress.last_update.clone(),
            update_count: progress.update_count,
        }
    }

    async fn read<R: DeserializeOwned>(&self, key: &str) -> Option<R> {
        let value = self.cache.lock().await.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl UpdateHandler for UpdateDispatcher {
    async fn handle_update(&self, envelope: &UpdateEnvelope) {
        self.apply(envelope).await;
    }
}
