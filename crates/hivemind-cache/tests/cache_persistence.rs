//! Persistence round-trip tests for the prompt cache.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use hivemind_cache::PromptCache;
use hivemind_core::CacheConfig;
use std::path::PathBuf;

fn config_at(path: PathBuf) -> CacheConfig {
    CacheConfig {
        persist_path: Some(path),
        ..CacheConfig::default()
    }
}

#[test]
fn test_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompt-cache.json");

    let cache = PromptCache::open(config_at(path.clone()));
    cache.set("summarize", "input data", "persona", "the summary", None);
    cache.set("extract", "other data", "persona", "the extraction", None);
    let persisted = cache.persist().unwrap();
    assert_eq!(persisted, 2);

    let reloaded = PromptCache::open(config_at(path));
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded.get("summarize", "input data", "persona").as_deref(),
        Some("the summary")
    );
}

#[test]
fn test_expired_entries_not_persisted_and_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompt-cache.json");

    let cache = PromptCache::open(config_at(path.clone()));
    cache.set("live", "", "", "fresh", None);
    cache.set("dead", "", "", "stale", Some(Duration::zero()));
    std::thread::sleep(std::time::Duration::from_millis(5));
    let persisted = cache.persist().unwrap();
    assert_eq!(persisted, 1);

    let reloaded = PromptCache::open(config_at(path));
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.get("dead", "", "").is_none());
    assert_eq!(reloaded.get("live", "", "").as_deref(), Some("fresh"));
}

#[test]
fn test_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompt-cache.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let cache = PromptCache::open(config_at(path));
    assert!(cache.is_empty());

    // And the cache still works normally afterwards.
    cache.set("k", "", "", "v", None);
    assert_eq!(cache.get("k", "", "").as_deref(), Some("v"));
}

#[test]
fn test_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PromptCache::open(config_at(dir.path().join("never-written.json")));
    assert!(cache.is_empty());
}

#[test]
fn test_persist_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompt-cache.json");

    let cache = PromptCache::open(config_at(path.clone()));
    cache.set("k", "", "", "v", None);
    cache.persist().unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn test_persist_without_path_is_noop() {
    let cache = PromptCache::new(CacheConfig::default());
    cache.set("k", "", "", "v", None);
    assert_eq!(cache.persist().unwrap(), 0);
}
