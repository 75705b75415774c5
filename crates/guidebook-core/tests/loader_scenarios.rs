//! Stale-while-revalidate scenarios for ContentLoader
//!
//! Run with:
//! ```bash
//! cargo test -p guidebook-core --test loader_scenarios
//! ```

mod common;

use chrono::{TimeZone, Utc};
use common::{content, temp_cache, Reply, ScriptedFetcher};
use guidebook_core::cache::CACHE_DB_FILE;
use guidebook_core::clock::{Clock, ManualClock};
use guidebook_core::{CacheConfig, ContentCache, ContentError, ContentLoader, DataEvent, LoadSource};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_miss_fetches_and_populates_cache() {
    let (_dir, cache) = temp_cache();
    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("# Rome", "v1", 0)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    assert_eq!(load.source, LoadSource::Network);
    assert!(load.revalidation.is_none());
    assert_eq!(load.record.body, "# Rome");
    assert_eq!(load.record.version_tag, "v1");

    let cached = cache.get("italy", "rome.md").unwrap().unwrap();
    assert_eq!(cached.body, "# Rome");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_hit_with_unchanged_version_leaves_cache_alone() {
    let (_dir, cache) = temp_cache();
    let stored = cache.put("italy", "rome.md", &content("# Rome", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("# Rome", "v1", 0)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    assert_eq!(load.source, LoadSource::Cache);
    assert_eq!(load.record, stored);

    let updated = load.revalidation.unwrap().updated().await;
    assert!(updated.is_none());
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap(), stored);
}

#[tokio::test]
async fn test_hit_with_new_version_notifies_and_overwrites() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("old", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("new", "v2", 5)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    let mut events = loader.event_bus().subscribe();

    let load = loader.load_content("italy", "rome.md").await.unwrap();
    assert_eq!(load.record.version_tag, "v1");
    assert_eq!(load.record.body, "old");

    let fresh = load.revalidation.unwrap().updated().await.unwrap();
    assert_eq!(fresh.version_tag, "v2");
    assert_eq!(fresh.body, "new");

    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap().version_tag, "v2");
    assert_eq!(
        events.recv().await.unwrap(),
        DataEvent::ContentUpdated {
            country: "italy".to_string(),
            path: "rome.md".to_string(),
            version_tag: "v2".to_string(),
        }
    );
}

#[tokio::test]
async fn test_hit_returns_before_network_completes() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("old", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("new", "v2", 5)));
    let gate = fetcher.gated();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    let load = tokio::time::timeout(
        Duration::from_secs(1),
        loader.load_content("italy", "rome.md"),
    )
    .await
    .expect("cache hit must not wait for the network")
    .unwrap();

    assert_eq!(load.record.body, "old");
    let revalidation = load.revalidation.unwrap();
    assert!(!revalidation.is_finished());

    gate.notify_one();
    assert_eq!(revalidation.updated().await.unwrap().body, "new");
}

#[tokio::test]
async fn test_miss_not_found_fails_without_caching() {
    let (_dir, cache) = temp_cache();
    let fetcher = ScriptedFetcher::new();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let err = loader.load_content("italy", "rome.md").await.unwrap_err();

    assert!(matches!(err, ContentError::LoadFailed { .. }));
    assert!(err.is_not_found());
    assert!(cache.get("italy", "rome.md").unwrap().is_none());
}

#[tokio::test]
async fn test_miss_network_error_is_load_failed() {
    let (_dir, cache) = temp_cache();
    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::NetworkDown);

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let err = loader.load_content("italy", "rome.md").await.unwrap_err();

    assert!(!err.is_not_found());
    assert_eq!(cache.stats().unwrap().count, 0);
}

#[tokio::test]
async fn test_background_failure_is_swallowed() {
    let (_dir, cache) = temp_cache();
    let stored = cache.put("italy", "rome.md", &content("old", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::NetworkDown);

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    assert_eq!(load.record, stored);
    assert!(load.revalidation.unwrap().updated().await.is_none());
    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap(), stored);
}

#[tokio::test]
async fn test_slow_revalidation_does_not_clobber_newer_write() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("v1", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("v2", "v2", 10)));
    let gate = fetcher.gated();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    // A later load refreshed the key with v3 while the first check was in flight
    cache.put("italy", "rome.md", &content("v3", "v3", 30)).unwrap();

    gate.notify_one();
    assert!(load.revalidation.unwrap().updated().await.is_none());
    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap().version_tag, "v3");
}

#[tokio::test]
async fn test_concurrent_hits_both_see_new_version() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("v1", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("v2", "v2", 10)));
    let gate = fetcher.gated();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    let mut events = loader.event_bus().subscribe();

    let first = loader.load_content("italy", "rome.md").await.unwrap();
    let second = loader.load_content("italy", "rome.md").await.unwrap();
    assert_eq!(first.record.version_tag, "v1");
    assert_eq!(second.record.version_tag, "v1");

    // Release one check and let it store v2 before the other one runs
    gate.notify_one();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, DataEvent::ContentUpdated { ref version_tag, .. } if version_tag == "v2"));

    gate.notify_one();
    let first = first.revalidation.unwrap().updated().await;
    let second = second.revalidation.unwrap().updated().await;

    assert_eq!(first.map(|r| r.version_tag).as_deref(), Some("v2"));
    assert_eq!(second.map(|r| r.version_tag).as_deref(), Some("v2"));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.stats().unwrap().count, 1);
}

#[tokio::test]
async fn test_expired_record_loads_from_network() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let cache = Arc::new(
        ContentCache::open_with_clock(dir.path(), CacheConfig::default(), clock.clone()).unwrap(),
    );
    cache.put("italy", "rome.md", &content("old", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("new", "v2", 5)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());

    clock.advance(chrono::Duration::hours(25));
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    assert_eq!(load.source, LoadSource::Network);
    assert!(load.revalidation.is_none());
    assert_eq!(load.record.body, "new");
    assert_eq!(fetcher.calls(), 1);

    // Repopulated with a fresh cached_at
    let cached = cache.get("italy", "rome.md").unwrap().unwrap();
    assert_eq!(cached.version_tag, "v2");
    assert_eq!(cached.cached_at, clock.now());
}

#[tokio::test]
async fn test_broken_cache_is_treated_as_miss() {
    let (dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("old", "v1", 0)).unwrap();

    // Break the schema underneath the open cache
    let conn = rusqlite::Connection::open(dir.path().join(CACHE_DB_FILE)).unwrap();
    conn.execute_batch("DROP TABLE content").unwrap();
    assert!(matches!(
        cache.get("italy", "rome.md"),
        Err(ContentError::StorageUnavailable { .. })
    ));

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("new", "v2", 5)));

    let loader = ContentLoader::new(Some(cache), fetcher.clone());
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    assert_eq!(load.source, LoadSource::Network);
    assert_eq!(load.record.body, "new");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_revalidation_writes_nothing() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("v1", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("v2", "v2", 10)));
    let gate = fetcher.gated();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let load = loader.load_content("italy", "rome.md").await.unwrap();

    let revalidation = load.revalidation.unwrap();
    revalidation.cancel();
    gate.notify_one();

    assert!(revalidation.updated().await.is_none());
    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap().version_tag, "v1");
}

#[tokio::test]
async fn test_dropped_revalidation_still_updates_cache() {
    let (_dir, cache) = temp_cache();
    cache.put("italy", "rome.md", &content("v1", "v1", 0)).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("v2", "v2", 10)));
    let gate = fetcher.gated();

    let loader = ContentLoader::new(Some(cache.clone()), fetcher);
    let mut events = loader.event_bus().subscribe();

    let load = loader.load_content("italy", "rome.md").await.unwrap();
    drop(load);
    gate.notify_one();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, DataEvent::ContentUpdated { ref version_tag, .. } if version_tag == "v2"));
    assert_eq!(cache.get("italy", "rome.md").unwrap().unwrap().version_tag, "v2");
}

#[tokio::test]
async fn test_runs_without_cache() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply("japan", "overview.md", Reply::Content(content("# Japan", "j1", 0)));

    let loader = ContentLoader::new(None, fetcher.clone());

    for _ in 0..2 {
        let load = loader.load_content("japan", "overview.md").await.unwrap();
        assert_eq!(load.source, LoadSource::Network);
    }
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_invalidate_publishes_and_forces_refetch() {
    let (_dir, cache) = temp_cache();
    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("# Rome", "v1", 0)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    loader.load_content("italy", "rome.md").await.unwrap();

    let mut events = loader.event_bus().subscribe();
    assert_eq!(loader.invalidate("italy", None).unwrap(), 1);
    assert_eq!(loader.invalidate("italy", None).unwrap(), 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        DataEvent::ContentInvalidated { path: None, .. }
    ));

    let load = loader.load_content("italy", "rome.md").await.unwrap();
    assert_eq!(load.source, LoadSource::Network);
}

#[tokio::test]
async fn test_clear_cache_publishes() {
    let (_dir, cache) = temp_cache();
    let fetcher = ScriptedFetcher::new();
    fetcher.reply("italy", "rome.md", Reply::Content(content("# Rome", "v1", 0)));
    fetcher.reply("japan", "tokyo.md", Reply::Content(content("# Tokyo", "v1", 0)));

    let loader = ContentLoader::new(Some(cache.clone()), fetcher.clone());
    loader.load_content("italy", "rome.md").await.unwrap();
    loader.load_content("japan", "tokyo.md").await.unwrap();

    let mut events = loader.event_bus().subscribe();
    assert_eq!(loader.clear_cache().unwrap(), 2);
    assert_eq!(events.recv().await.unwrap(), DataEvent::CacheCleared);
    assert_eq!(cache.stats().unwrap().count, 0);
}
