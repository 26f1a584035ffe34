//! In-memory TTL cache with access-based eviction and statistics.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::snapshot::CacheSnapshot;
use super::stats::{CacheCounters, CacheStats};
use crate::clock::current_time_ms;

/// Share of entries dropped when `set` hits capacity (least recently accessed first).
const CAPACITY_EVICTION_PERCENT: usize = 10;
/// `optimize` only runs above this occupancy.
const OPTIMIZE_THRESHOLD_PERCENT: usize = 80;
/// Share of entries dropped by `optimize` (least used first).
const OPTIMIZE_EVICTION_PERCENT: usize = 20;

/// Cache sizing and maintenance settings (`[cache]` in `proxywatch.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl_ms: u64,
    pub cleanup_interval_ms: u64,
    pub optimize_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 5 * 60 * 1000,
            cleanup_interval_ms: 60 * 1000,
            optimize_interval_ms: 5 * 60 * 1000,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn optimize_interval(&self) -> Duration {
        Duration::from_millis(self.optimize_interval_ms)
    }
}

/// Key/value store with per-entry TTL.
///
/// Reads never fail: an absent or expired key is a miss. Expired entries are
/// removed lazily on `get`/`has` and eagerly by `cleanup`.
#[derive(Debug)]
pub struct CacheStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    counters: CacheCounters,
    max_entries: usize,
    default_ttl_ms: u64,
    next_sequence: u64,
}

impl<T> CacheStore<T> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.default_ttl())
    }

    pub fn with_capacity(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            counters: CacheCounters::default(),
            max_entries: max_entries.max(1),
            default_ttl_ms: default_ttl.as_millis() as u64,
            next_sequence: 0,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Number of entries physically held, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Check freshness without touching access statistics. Expired entries are purged.
    pub fn has(&mut self, key: &str) -> bool {
        self.has_at(key, current_time_ms())
    }

    pub(crate) fn has_at(&mut self, key: &str, now_ms: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now_ms) => {
                self.expire(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.deletes += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        let count = self.entries.len() as u64;
        self.entries.clear();
        self.counters.deletes += count;
    }

    /// Remove every entry whose age exceeds its TTL. Returns the number removed.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(current_time_ms())
    }

    pub(crate) fn cleanup_at(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        let removed = before - self.entries.len();
        self.counters.expirations += removed as u64;
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "cache cleanup");
        }
        removed
    }

    /// Remove all keys matching a regular expression.
    ///
    /// An invalid pattern is logged and removes nothing.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> usize {
        match Regex::new(pattern) {
            Ok(regex) => self.invalidate_regex(&regex),
            Err(e) => {
                warn!(pattern, error = %e, "invalid cache invalidation pattern");
                0
            }
        }
    }

    pub fn invalidate_regex(&mut self, regex: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !regex.is_match(key));
        let removed = before - self.entries.len();
        self.counters.deletes += removed as u64;
        debug!(pattern = regex.as_str(), removed, "cache invalidation");
        removed
    }

    /// Usage-based eviction: above 80% occupancy, drop the bottom 20% ranked by
    /// (access count, last access). Returns the number removed.
    ///
    /// This is not the recency-only eviction that `set` applies at capacity.
    pub fn optimize(&mut self) -> usize {
        let len = self.entries.len();
        if len * 100 <= self.max_entries * OPTIMIZE_THRESHOLD_PERCENT {
            return 0;
        }
        let count = len * OPTIMIZE_EVICTION_PERCENT / 100;
        let removed = self.evict_ranked(count, |entry| (entry.access_count, entry.last_accessed));
        debug!(removed, remaining = self.entries.len(), "cache optimized");
        removed
    }

    /// Capacity eviction used by `set`: drop the oldest 10% by last access.
    fn evict_for_capacity(&mut self) -> usize {
        let count = (self.entries.len() * CAPACITY_EVICTION_PERCENT / 100).max(1);
        let removed = self.evict_ranked(count, |entry| entry.last_accessed);
        debug!(removed, max_entries = self.max_entries, "cache at capacity, evicted");
        removed
    }

    /// Remove the `count` lowest-ranked entries. Ties fall back to access order.
    fn evict_ranked<R, F>(&mut self, count: usize, rank: F) -> usize
    where
        R: Ord,
        F: Fn(&CacheEntry<T>) -> R,
    {
        if count == 0 {
            return 0;
        }
        let mut ranked: Vec<(R, u64, &String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (rank(entry), entry.sequence, key))
            .collect();
        ranked.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        let victims: Vec<String> = ranked
            .into_iter()
            .take(count)
            .map(|(_, _, key)| key.clone())
            .collect();

        for key in &victims {
            self.entries.remove(key);
        }
        self.counters.evictions += victims.len() as u64;
        victims.len()
    }

    fn bump_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn expire(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.counters.expirations += 1;
            debug!(key, "cache entry expired");
        }
    }

    fn insert_at(&mut self, key: String, data: T, ttl_ms: u64, now_ms: u64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_for_capacity();
        }
        let mut entry = CacheEntry::new(key.clone(), data, ttl_ms, now_ms);
        entry.sequence = self.bump_sequence();
        self.entries.insert(key, entry);
        self.counters.sets += 1;
    }

    pub fn set(&mut self, key: impl Into<String>, data: T) {
        let ttl_ms = self.default_ttl_ms;
        self.insert_at(key.into(), data, ttl_ms, current_time_ms());
    }

    pub fn set_with_ttl(&mut self, key: impl Into<String>, data: T, ttl: Duration) {
        self.insert_at(key.into(), data, ttl.as_millis() as u64, current_time_ms());
    }

    pub(crate) fn set_at(&mut self, key: &str, data: T, ttl_ms: u64, now_ms: u64) {
        self.insert_at(key.to_string(), data, ttl_ms, now_ms);
    }
}

impl<T: Clone> CacheStore<T> {
    /// Fresh hit returns a copy of the value and bumps its access stats;
    /// absent or expired is a miss (expired entries are removed).
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.get_at(key, current_time_ms())
    }

    pub(crate) fn get_at(&mut self, key: &str, now_ms: u64) -> Option<T> {
        let sequence = self.next_sequence + 1;
        let expired = match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now_ms) => {
                self.next_sequence = sequence;
                entry.touch(now_ms, sequence);
                self.counters.hits += 1;
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.expire(key);
        }
        self.counters.misses += 1;
        None
    }

    /// Return the cached value if fresh, otherwise await `fetcher`, store its
    /// result under the default TTL and return it.
    ///
    /// A fetch error propagates to this caller and leaves the key unset.
    /// Concurrent preloads of the same key are not deduplicated. The store is
    /// mutably borrowed for the whole call, so a maintenance task that shares
    /// it behind a lock cannot sweep the key while the fetch is in flight.
    pub async fn preload<F, Fut, E>(&mut self, key: &str, fetcher: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = self.default_ttl();
        self.preload_with_ttl(key, fetcher, ttl).await
    }

    pub async fn preload_with_ttl<F, Fut, E>(
        &mut self,
        key: &str,
        fetcher: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }

        let data = fetcher().await?;
        self.set_with_ttl(key, data.clone(), ttl);
        Ok(data)
    }
}

impl<T: Serialize> CacheStore<T> {
    pub fn stats(&self) -> CacheStats {
        let total_size = self
            .entries
            .values()
            .map(|entry| serde_json::to_vec(entry).map(|b| b.len()).unwrap_or(0))
            .sum();
        let oldest = self.entries.values().map(|e| e.timestamp).min();
        let newest = self.entries.values().map(|e| e.timestamp).max();

        CacheStats::from_counters(&self.counters, self.entries.len(), total_size, oldest, newest)
    }
}

impl<T: Serialize + Clone> CacheStore<T> {
    /// Serialize every entry and the counters as JSON.
    pub fn export(&self) -> Result<String, serde_json::Error> {
        self.export_at(current_time_ms())
    }

    pub(crate) fn export_at(&self, now_ms: u64) -> Result<String, serde_json::Error> {
        let snapshot = CacheSnapshot {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            stats: self.counters.clone(),
            timestamp: now_ms,
        };
        serde_json::to_string(&snapshot)
    }
}

impl<T: DeserializeOwned> CacheStore<T> {
    /// Load a snapshot produced by `export`.
    ///
    /// Entries that have already expired are skipped; imported entries replace
    /// existing ones with the same key and the counters are restored. Malformed
    /// input returns `false` and leaves the store untouched.
    pub fn import(&mut self, data: &str) -> bool {
        self.import_at(data, current_time_ms())
    }

    pub(crate) fn import_at(&mut self, data: &str, now_ms: u64) -> bool {
        let snapshot: CacheSnapshot<T> = match serde_json::from_str(data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "rejecting malformed cache snapshot");
                return false;
            }
        };

        let mut imported = 0usize;
        let mut skipped = 0usize;
        for (key, mut entry) in snapshot.entries {
            if entry.is_expired(now_ms) {
                skipped += 1;
                continue;
            }
            entry.key = key.clone();
            entry.sequence = self.bump_sequence();
            self.entries.insert(key, entry);
            imported += 1;
        }
        self.counters = snapshot.stats;

        while self.entries.len() > self.max_entries {
            if self.evict_for_capacity() == 0 {
                break;
            }
        }

        debug!(imported, skipped, "cache snapshot imported");
        true
    }
}
