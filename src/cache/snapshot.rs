//! Serialized form of a cache store used by `export` / `import`.

use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;
use super::stats::CacheCounters;

/// `{entries: [[key, entry], ...], stats, timestamp}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot<T> {
    pub entries: Vec<(String, CacheEntry<T>)>,
    pub stats: CacheCounters,
    /// When the snapshot was taken, milliseconds since epoch.
    pub timestamp: u64,
}
