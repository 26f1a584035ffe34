//! Fleet data carried by update envelopes, plus the synthetic fleet simulator.

mod envelope;
mod simulator;
mod types;

pub use envelope::{UpdateEnvelope, UpdateKind, UpdatePayload};
pub use simulator::FleetSimulator;
pub use types::{FleetStats, HealthCheck, ProxyHealth, ProxyStatus, COST_PER_MBPS_HOUR};
