//! A single cached value plus the bookkeeping used for expiry and eviction.

use serde::{Deserialize, Serialize};

/// Cached value with insertion time, TTL and access statistics.
///
/// All timestamps are milliseconds since the UNIX epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: u64,
    /// Time-to-live in milliseconds.
    pub ttl: u64,
    pub access_count: u64,
    pub last_accessed: u64,
    pub key: String,
    /// Store-wide recency order; breaks ties between accesses in the same millisecond.
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(key: String, data: T, ttl_ms: u64, now_ms: u64) -> Self {
        Self {
            data,
            timestamp: now_ms,
            ttl: ttl_ms,
            access_count: 0,
            last_accessed: now_ms,
            key,
            sequence: 0,
        }
    }

    /// An entry is dead once its age strictly exceeds its TTL.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) > self.ttl
    }

    /// Record a read hit.
    pub(crate) fn touch(&mut self, now_ms: u64, sequence: u64) {
        self.access_count += 1;
        self.last_accessed = now_ms;
        self.sequence = sequence;
    }
}
