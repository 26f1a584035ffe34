//! Ephemeral analytics cache: TTL entries, capacity and usage-based eviction,
//! pattern invalidation, JSON snapshots and a background maintenance task.
//!
//! Each use site owns its own `CacheStore`; share one between tasks through
//! [`SharedCache`]. Consumers sharing a store must keep to disjoint key prefixes.

mod entry;
mod maintenance;
mod snapshot;
mod stats;
mod store;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use entry::CacheEntry;
pub use maintenance::{spawn_maintenance, MaintenanceHandle};
pub use snapshot::CacheSnapshot;
pub use stats::{CacheCounters, CacheStats};
pub use store::{CacheConfig, CacheStore};

/// A cache store shared between async tasks. Operations run to completion under the lock.
pub type SharedCache<T> = Arc<Mutex<CacheStore<T>>>;

/// Wrap a store for sharing.
pub fn shared<T>(store: CacheStore<T>) -> SharedCache<T> {
    Arc::new(Mutex::new(store))
}
