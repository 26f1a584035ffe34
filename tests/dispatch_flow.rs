// tests/dispatch_flow.rs
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{poll_until, Recorder, ScriptedSource};
use proxywatch::cache::{shared, CacheConfig, CacheStore};
use proxywatch::connection::{ConnectionConfig, ConnectionManager, SyntheticSource};
use proxywatch::dispatcher::UpdateDispatcher;
use proxywatch::fleet::{FleetStats, UpdateEnvelope, UpdateKind, UpdatePayload};

fn stats_envelope(timestamp: u64, streams: u32) -> UpdateEnvelope {
    UpdateEnvelope {
        kind: UpdateKind::StatsUpdate,
        timestamp,
        payload: UpdatePayload {
            stats: Some(FleetStats {
                total_streams: streams,
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_updates_reach_cache_in_delivery_order() {
    let envelopes: Vec<_> = (1..=50).map(|i| stats_envelope(i, i as u32)).collect();
    let manager = ConnectionManager::new(
        ConnectionConfig::default(),
        Arc::new(ScriptedSource::new(envelopes)),
        Arc::new(SyntheticSource::new(Duration::from_secs(60))),
    );

    let cache = shared(CacheStore::new(&CacheConfig::default()));
    let dispatcher = Arc::new(UpdateDispatcher::new(cache.clone()));
    let recorder = Arc::new(Recorder::default());
    manager.subscribe(dispatcher.clone());
    manager.subscribe(recorder.clone());
    manager.connect();

    poll_until(|| async { (dispatcher.update_count() == 50).then_some(()) })
        .await
        .expect("updates not dispatched");

    assert_eq!(recorder.timestamps().await, (1..=50).collect::<Vec<u64>>());
    assert_eq!(dispatcher.last_update().unwrap().timestamp, 50);
    // Last write wins under the fixed key.
    assert_eq!(dispatcher.stats().await.unwrap().total_streams, 50);
    assert_eq!(cache.lock().await.keys(), vec!["stats".to_string()]);
    assert_eq!(manager.info().update_count, 50);

    manager.disconnect().await;
}

#[tokio::test]
async fn test_fallback_feeds_the_dispatcher() {
    let config = ConnectionConfig {
        url: "gopher://not-a-channel".to_string(),
        mock_interval_ms: 10,
        ..Default::default()
    };
    let manager = ConnectionManager::with_default_sources(config);
    let dispatcher = Arc::new(UpdateDispatcher::new(shared(CacheStore::new(
        &CacheConfig::default(),
    ))));
    manager.subscribe(dispatcher.clone());
    manager.connect();

    let snapshot = poll_until(|| async {
        let snapshot = dispatcher.snapshot().await;
        (snapshot.stats.is_some() && !snapshot.health_checks.is_empty()).then_some(snapshot)
    })
    .await
    .expect("fallback never populated the cache");

    assert!(manager.info().is_using_mock_data);
    assert_eq!(snapshot.proxies.len(), proxywatch::connection::DEFAULT_PROXY_COUNT);
    assert!(snapshot.update_count >= 1);

    manager.disconnect().await;
}
