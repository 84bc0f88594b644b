//! Response-cache behavior against a real temp store file.

use repoagent::cache::ResponseCache;
use std::fs;

#[test]
fn round_trip_and_key_sensitivity() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("responses.json"), 3600);

    cache.set("explain X", "model-a", "X is ...");
    assert_eq!(cache.get("explain X", "model-a").as_deref(), Some("X is ..."));
    assert!(cache.get("explain X", "model-b").is_none());
    assert!(cache.get("explain X!", "model-a").is_none());
}

#[test]
fn zero_expiration_means_immediate_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("responses.json"), 0);

    cache.set("p", "m", "r");
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(cache.get("p", "m").is_none());
}

#[test]
fn cleanup_keeps_live_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("responses.json");
    let expiring = ResponseCache::new(&path, 0);
    let durable = ResponseCache::new(&path, 3600);

    expiring.set("stale", "m", "old");
    durable.set("fresh", "m", "new");
    std::thread::sleep(std::time::Duration::from_millis(5));

    durable.cleanup_expired();
    assert!(durable.get("stale", "m").is_none());
    assert_eq!(durable.get("fresh", "m").as_deref(), Some("new"));
    assert_eq!(durable.live_entries(), 1);
}

#[test]
fn clear_empties_the_store_and_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("responses.json"), 3600);

    cache.set("p1", "m", "r1");
    cache.set("p2", "m", "r2");
    cache.clear();
    assert!(cache.get("p1", "m").is_none());
    assert!(cache.get("p2", "m").is_none());

    // A second clear on the now-missing store is a no-op.
    cache.clear();
    assert!(!cache.store_path().exists());
}

#[test]
fn corrupted_store_degrades_to_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("responses.json");
    fs::write(&path, "\u{0}\u{1}garbage").unwrap();

    let cache = ResponseCache::new(&path, 3600);
    assert!(cache.get("p", "m").is_none());
    cache.set("p", "m", "recovered");
    assert_eq!(cache.get("p", "m").as_deref(), Some("recovered"));
}

#[test]
fn distinct_processes_share_the_store_file() {
    // Two cache handles over the same path model sequential CLI invocations.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("responses.json");
    let first = ResponseCache::new(&path, 3600);
    let second = ResponseCache::new(&path, 3600);

    first.set("p", "m", "from-first");
    assert_eq!(second.get("p", "m").as_deref(), Some("from-first"));
}
