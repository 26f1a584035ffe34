use serde::{Deserialize, Serialize};

/// Hourly cost per Mbps of egress bandwidth, in dollars.
pub const COST_PER_MBPS_HOUR: f64 = 0.0125;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyHealth {
    Online,
    Degraded,
    Offline,
}

/// Live status of one streaming proxy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStatus {
    pub id: String,
    pub name: String,
    pub region: String,
    pub status: ProxyHealth,
    pub active_streams: u32,
    pub viewers: u32,
    pub bandwidth_mbps: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub latency_ms: f64,
    /// Percentage of failed requests.
    pub error_rate: f64,
    /// Percentage of the trailing window the proxy was reachable.
    pub uptime: f64,
    pub last_seen: u64,
}

/// Fleet-wide aggregates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub total_proxies: u32,
    pub online_proxies: u32,
    pub total_streams: u32,
    pub total_viewers: u32,
    pub total_bandwidth_mbps: f64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub uptime: f64,
    pub hourly_cost: f64,
}

impl FleetStats {
    /// Aggregate proxy statuses. Latency, error rate and uptime are averaged
    /// over proxies that are not offline.
    pub fn from_proxies(proxies: &[ProxyStatus]) -> Self {
        let reachable: Vec<&ProxyStatus> = proxies
            .iter()
            .filter(|p| p.status != ProxyHealth::Offline)
            .collect();

        let total_bandwidth_mbps: f64 = proxies.iter().map(|p| p.bandwidth_mbps).sum();
        let mean = |f: fn(&ProxyStatus) -> f64| -> f64 {
            if reachable.is_empty() {
                0.0
            } else {
                reachable.iter().map(|p| f(p)).sum::<f64>() / reachable.len() as f64
            }
        };

        Self {
            total_proxies: proxies.len() as u32,
            online_proxies: proxies
                .iter()
                .filter(|p| p.status == ProxyHealth::Online)
                .count() as u32,
            total_streams: proxies.iter().map(|p| p.active_streams).sum(),
            total_viewers: proxies.iter().map(|p| p.viewers).sum(),
            total_bandwidth_mbps,
            avg_latency_ms: mean(|p| p.latency_ms),
            error_rate: mean(|p| p.error_rate),
            uptime: mean(|p| p.uptime),
            hourly_cost: total_bandwidth_mbps * COST_PER_MBPS_HOUR,
        }
    }
}

/// Result of probing one proxy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub proxy_id: String,
    pub healthy: bool,
    pub response_time_ms: f64,
    pub checked_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
