//! The update envelope delivered by the live channel and the synthetic generator.

use serde::{Deserialize, Serialize};

use super::types::{FleetStats, HealthCheck, ProxyStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    ProxyUpdate,
    StatsUpdate,
    HealthUpdate,
    BatchUpdate,
    /// Any type this build does not know about. Still counted and recorded.
    #[serde(other)]
    Unknown,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::ProxyUpdate => "proxy_update",
            UpdateKind::StatsUpdate => "stats_update",
            UpdateKind::HealthUpdate => "health_update",
            UpdateKind::BatchUpdate => "batch_update",
            UpdateKind::Unknown => "unknown",
        }
    }
}

/// Collections carried by an update. Absent collections leave cached values untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxies: Option<Vec<ProxyStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FleetStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_checks: Option<Vec<HealthCheck>>,
}

impl UpdatePayload {
    pub fn is_empty(&self) -> bool {
        self.proxies.is_none() && self.stats.is_none() && self.health_checks.is_none()
    }
}

/// `{type, timestamp, payload}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Milliseconds since epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub payload: UpdatePayload,
}
