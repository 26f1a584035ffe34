//! Hit/miss counters and the derived statistics report.

use serde::{Deserialize, Serialize};

/// Raw operation counters. These travel with exported snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Entries removed by capacity or usage-based eviction.
    #[serde(default)]
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    #[serde(default)]
    pub expirations: u64,
}

impl CacheCounters {
    pub fn hit_rate(&self) -> f64 {
        percentage(self.hits, self.hits + self.misses)
    }

    pub fn miss_rate(&self) -> f64 {
        percentage(self.misses, self.hits + self.misses)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Point-in-time statistics for a cache store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub total_entries: usize,
    /// Sum of the serialized sizes of all entries, in bytes.
    pub total_size: usize,
    /// Insertion timestamp of the oldest entry.
    pub oldest_entry: Option<u64>,
    /// Insertion timestamp of the newest entry.
    pub newest_entry: Option<u64>,
}

impl CacheStats {
    pub(crate) fn from_counters(
        counters: &CacheCounters,
        total_entries: usize,
        total_size: usize,
        oldest_entry: Option<u64>,
        newest_entry: Option<u64>,
    ) -> Self {
        Self {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            expirations: counters.expirations,
            hit_rate: counters.hit_rate(),
            miss_rate: counters.miss_rate(),
            total_entries,
            total_size,
            oldest_entry,
            newest_entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_zero_without_accesses() {
        let counters = CacheCounters::default();
        assert_eq!(counters.hit_rate(), 0.0);
        assert_eq!(counters.miss_rate(), 0.0);
    }

    #[test]
    fn rates_are_percentages() {
        let counters = CacheCounters {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(counters.hit_rate(), 75.0);
        assert_eq!(counters.miss_rate(), 25.0);
    }

    #[test]
    fn older_snapshots_without_eviction_counters_still_parse() {
        let json = r#"{"hits":1,"misses":2,"sets":3,"deletes":4}"#;
        let counters: CacheCounters = serde_json::from_str(json).unwrap();
        assert_eq!(counters.deletes, 4);
        assert_eq!(counters.evictions, 0);
    }
}
