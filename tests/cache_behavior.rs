// tests/cache_behavior.rs
use std::time::Duration;

use proxywatch::cache::CacheStore;

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let mut cache: CacheStore<String> = CacheStore::with_capacity(10, Duration::from_secs(60));
    cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(100));
    assert_eq!(cache.get("k"), Some("v".to_string()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get("k"), None);
    assert!(!cache.has("k"));
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_repeated_reads_are_identical() {
    let mut cache: CacheStore<Vec<u32>> = CacheStore::with_capacity(10, Duration::from_secs(60));
    cache.set("proxy:1", vec![1, 2, 3]);
    let first = cache.get("proxy:1");
    let second = cache.get("proxy:1");
    assert_eq!(first, second);
    assert_eq!(cache.stats().hits, 2);
}

#[test]
fn test_capacity_is_never_exceeded() {
    let n = 20;
    let mut cache: CacheStore<usize> = CacheStore::with_capacity(n, Duration::from_secs(60));
    for i in 0..=n {
        cache.set(format!("key:{}", i), i);
        assert!(cache.size() <= n);
    }
    // The oldest insert was never read, so it went first.
    assert!(!cache.has("key:0"));
    assert!(cache.has(&format!("key:{}", n)));
    assert!(cache.stats().evictions >= 1);
}

#[test]
fn test_eviction_follows_insertion_order_not_key_order() {
    let mut cache: CacheStore<u8> = CacheStore::with_capacity(2, Duration::from_secs(60));
    cache.set("zeta", 1);
    cache.set("alpha", 2);
    cache.set("mid", 3);

    assert!(!cache.has("zeta"));
    assert!(cache.has("alpha"));
    assert!(cache.has("mid"));
}

#[test]
fn test_pattern_invalidation_counts_matches() {
    let mut cache: CacheStore<u8> = CacheStore::with_capacity(10, Duration::from_secs(60));
    cache.set("proxy:1", 1);
    cache.set("proxy:2", 2);
    cache.set("stats:1", 3);

    assert_eq!(cache.invalidate_pattern("^proxy:"), 2);
    assert_eq!(cache.keys(), vec!["stats:1".to_string()]);
}

#[test]
fn test_export_import_into_fresh_store() {
    let mut source: CacheStore<serde_json::Value> =
        CacheStore::with_capacity(10, Duration::from_secs(60));
    source.set("proxies", serde_json::json!([{"id": "proxy-001"}]));
    source.set("stats", serde_json::json!({"totalStreams": 12}));
    let exported = source.export().unwrap();

    let mut restored: CacheStore<serde_json::Value> =
        CacheStore::with_capacity(10, Duration::from_secs(60));
    assert!(restored.import(&exported));
    for key in ["proxies", "stats"] {
        assert_eq!(restored.get(key), source.get(key));
    }

    assert!(!restored.import("{not json"));
    assert_eq!(restored.size(), 2);
}

#[tokio::test]
async fn test_preload_fetches_once_then_serves_cache() {
    let mut cache: CacheStore<u64> = CacheStore::with_capacity(10, Duration::from_secs(60));
    let mut calls = 0;

    let first: Result<u64, String> = cache
        .preload("answer", || {
            calls += 1;
            async { Ok(42) }
        })
        .await;
    assert_eq!(first, Ok(42));

    let second: Result<u64, String> = cache
        .preload("answer", || {
            calls += 1;
            async { Ok(0) }
        })
        .await;
    assert_eq!(second, Ok(42));
    assert_eq!(calls, 1);

    let failed: Result<u64, String> = cache
        .preload("missing", || async { Err("upstream down".to_string()) })
        .await;
    assert!(failed.is_err());
    assert!(!cache.has("missing"));
}
