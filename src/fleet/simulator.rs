//! Synthetic fleet used while the live channel is unavailable.
//!
//! Produces envelopes with the same shape as the live channel. Each tick drifts
//! the proxy metrics a little and rotates through the update kinds, starting
//! with a full batch so consumers are populated on the first delivery.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::envelope::{UpdateEnvelope, UpdateKind, UpdatePayload};
use super::types::{FleetStats, HealthCheck, ProxyHealth, ProxyStatus};

const REGIONS: &[&str] = &["us-east", "us-west", "eu-central", "ap-southeast"];
/// Average bitrate delivered per viewer.
const MBPS_PER_VIEWER: f64 = 2.5;
const OFFLINE_PROBABILITY: f64 = 0.03;
const DEGRADED_LATENCY_MS: f64 = 200.0;
const DEGRADED_ERROR_RATE: f64 = 4.0;

pub struct FleetSimulator {
    rng: StdRng,
    proxies: Vec<ProxyStatus>,
    tick: u64,
}

impl FleetSimulator {
    pub fn new(proxy_count: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let proxies = (0..proxy_count)
            .map(|i| {
                let streams = rng.gen_range(5..60);
                let viewers = streams * rng.gen_range(15..40);
                ProxyStatus {
                    id: format!("proxy-{:03}", i + 1),
                    name: format!("edge-{:03}", i + 1),
                    region: REGIONS[i % REGIONS.len()].to_string(),
                    status: ProxyHealth::Online,
                    active_streams: streams,
                    viewers,
                    bandwidth_mbps: viewers as f64 * MBPS_PER_VIEWER,
                    cpu_usage: rng.gen_range(15.0..60.0),
                    memory_usage: rng.gen_range(30.0..70.0),
                    latency_ms: rng.gen_range(20.0..120.0),
                    error_rate: rng.gen_range(0.0..1.5),
                    uptime: rng.gen_range(99.0..100.0),
                    last_seen: 0,
                }
            })
            .collect();

        Self {
            rng,
            proxies,
            tick: 0,
        }
    }

    pub fn proxies(&self) -> &[ProxyStatus] {
        &self.proxies
    }

    /// Advance one tick and build the envelope for it.
    pub fn next_envelope(&mut self, now_ms: u64) -> UpdateEnvelope {
        self.drift(now_ms);

        let kind = match self.tick % 4 {
            0 => UpdateKind::BatchUpdate,
            1 => UpdateKind::ProxyUpdate,
            2 => UpdateKind::StatsUpdate,
            _ => UpdateKind::HealthUpdate,
        };
        self.tick += 1;

        let payload = match kind {
            UpdateKind::ProxyUpdate => UpdatePayload {
                proxies: Some(self.proxies.clone()),
                ..Default::default()
            },
            UpdateKind::StatsUpdate => UpdatePayload {
                stats: Some(FleetStats::from_proxies(&self.proxies)),
                ..Default::default()
            },
            UpdateKind::HealthUpdate => UpdatePayload {
                health_checks: Some(self.health_checks(now_ms)),
                ..Default::default()
            },
            _ => UpdatePayload {
                proxies: Some(self.proxies.clone()),
                stats: Some(FleetStats::from_proxies(&self.proxies)),
                health_checks: Some(self.health_checks(now_ms)),
            },
        };

        UpdateEnvelope {
            kind,
            timestamp: now_ms,
            payload,
        }
    }

    fn drift(&mut self, now_ms: u64) {
        for proxy in &mut self.proxies {
            let rng = &mut self.rng;

            if rng.gen_bool(OFFLINE_PROBABILITY) {
                proxy.status = ProxyHealth::Offline;
                proxy.active_streams = 0;
                proxy.viewers = 0;
                proxy.bandwidth_mbps = 0.0;
                proxy.uptime = (proxy.uptime - 0.5).max(90.0);
                continue;
            }

            let delta: i64 = rng.gen_range(-4..=5);
            proxy.active_streams = (proxy.active_streams as i64 + delta).clamp(1, 200) as u32;
            proxy.viewers = proxy.active_streams * rng.gen_range(15..40);
            proxy.bandwidth_mbps = proxy.viewers as f64 * MBPS_PER_VIEWER;
            proxy.cpu_usage = (proxy.cpu_usage + rng.gen_range(-5.0..5.0)).clamp(5.0, 98.0);
            proxy.memory_usage = (proxy.memory_usage + rng.gen_range(-3.0..3.0)).clamp(10.0, 95.0);
            proxy.latency_ms = (proxy.latency_ms + rng.gen_range(-15.0..15.0)).clamp(10.0, 400.0);
            proxy.error_rate = (proxy.error_rate + rng.gen_range(-0.5..0.5)).clamp(0.0, 10.0);
            proxy.uptime = (proxy.uptime + rng.gen_range(-0.05..0.05)).clamp(90.0, 100.0);
            proxy.last_seen = now_ms;
            proxy.status = if proxy.latency_ms > DEGRADED_LATENCY_MS
                || proxy.error_rate > DEGRADED_ERROR_RATE
            {
                ProxyHealth::Degraded
            } else {
                ProxyHealth::Online
            };
        }
    }

    fn health_checks(&self, now_ms: u64) -> Vec<HealthCheck> {
        self.proxies
            .iter()
            .map(|proxy| {
                let message = match proxy.status {
                    ProxyHealth::Online => None,
                    ProxyHealth::Degraded => Some(format!(
                        "degraded: latency {:.0}ms, errors {:.1}%",
                        proxy.latency_ms, proxy.error_rate
                    )),
                    ProxyHealth::Offline => Some("unreachable".to_string()),
                };
                HealthCheck {
                    proxy_id: proxy.id.clone(),
                    healthy: proxy.status != ProxyHealth::Offline,
                    response_time_ms: proxy.latency_ms,
                    checked_at: now_ms,
                    message,
                }
            })
            .collect()
    }
}
