//! Monitoring core for a fleet of streaming proxies: an ephemeral analytics
//! cache, a resilient live-update connection and a trend/forecast engine.

pub mod cache;
pub mod cli;
mod clock;
pub mod connection;
pub mod dispatcher;
pub mod fleet;
pub mod native;
pub mod trend;

// Re-export tracing for use in other modules
pub use tracing;

pub use cache::{CacheConfig, CacheStore, SharedCache};
pub use clock::current_time_ms;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use dispatcher::UpdateDispatcher;
pub use native::{build_router, AppState};
