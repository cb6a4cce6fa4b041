//! Integration tests for the get-or-populate protocol
//!
//! Time is simulated by moving entry modification times into the past.

use std::cell::Cell;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fscache::{Cache, CacheConfig, Produced, Ttl};
use serde_json::{json, Value};
use tempfile::TempDir;

fn create_cache(ttl: Ttl) -> (Cache, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = CacheConfig::with_path(temp_dir.path()).with_default_ttl(ttl);
    let cache = Cache::new(config).with_bypass_probe(|_| false);
    (cache, temp_dir)
}

fn set_age(path: &Path, minutes: u64) {
    let mtime = SystemTime::now() - Duration::from_secs(minutes * 60);
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(mtime))
        .expect("Should set mtime");
}

#[test]
fn test_hit_then_miss_refilled_over_time() {
    let (cache, _temp_dir) = create_cache(Ttl::Minutes(10));
    assert!(cache.write("user.42", &json!({"n": 1})));

    // t = 5 min: still fresh, producer untouched
    set_age(&cache.path("user.42"), 5);
    let called = Cell::new(false);
    let result: Option<Value> = cache.get(
        "user.42",
        || {
            called.set(true);
            Produced::Value(json!({"n": 2}))
        },
        None,
    );
    assert_eq!(result, Some(json!({"n": 1})));
    assert!(!called.get(), "Producer must not run on a hit");

    // t = 11 min: expired, refilled and persisted
    set_age(&cache.path("user.42"), 11);
    let result: Option<Value> = cache.get("user.42", || Produced::Value(json!({"n": 3})), None);
    assert_eq!(result, Some(json!({"n": 3})));
    assert_eq!(
        cache.read::<Value>("user.42", None, None),
        Some(json!({"n": 3}))
    );
    assert!(cache.age("user.42").expect("age") <= 1);
}

#[test]
fn test_stale_recovered_extends_freshness_window() {
    let (cache, _temp_dir) = create_cache(Ttl::Minutes(10));
    assert!(cache.write("feed", &json!(["a", "b"])));
    set_age(&cache.path("feed"), 45);
    assert!(!cache.has("feed", None));

    let result: Option<Value> =
        cache.get("feed", || Produced::Failed("upstream timeout".into()), None);
    assert_eq!(result, Some(json!(["a", "b"])));
    assert!(cache.has("feed", None));

    // Within the extended window the producer is not retried
    let retried = Cell::new(false);
    let result: Option<Value> = cache.get(
        "feed",
        || {
            retried.set(true);
            Produced::Failed("still down".into())
        },
        None,
    );
    assert_eq!(result, Some(json!(["a", "b"])));
    assert!(!retried.get());
}

#[test]
fn test_failure_without_entry_returns_no_data() {
    let (cache, _temp_dir) = create_cache(Ttl::Minutes(10));
    let result: Option<Value> = cache.get("nothing", || Produced::Failed("nope".into()), None);
    assert_eq!(result, None);
    assert_eq!(cache.age("nothing"), None);
}

#[test]
fn test_empty_result_is_treated_like_failure() {
    let (cache, _temp_dir) = create_cache(Ttl::Minutes(10));
    assert!(cache.write("report", &json!({"rows": 3})));
    set_age(&cache.path("report"), 30);

    let result: Option<Value> = cache.get("report", || None, None);
    assert_eq!(result, Some(json!({"rows": 3})));
    assert!(cache.has("report", None));
}

#[test]
fn test_bypass_failure_triggers_termination_hook() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = CacheConfig::with_path(temp_dir.path())
        .with_default_ttl(Ttl::Never)
        .with_bypass("disablecache");
    let terminated = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&terminated);
    let cache = Cache::new(config)
        .with_bypass_probe(|keyword| keyword == "disablecache")
        .with_fatal_hook(move |_| flag.store(true, Ordering::SeqCst));

    assert!(cache.write("user.42", &json!({"n": 1})));
    let result: Option<Value> =
        cache.get("user.42", || Produced::Failed("database gone".into()), None);

    assert!(terminated.load(Ordering::SeqCst));
    assert_eq!(result, None, "Stale data is never served in bypass mode");
}

#[test]
fn test_delete_directory_removes_sibling_keys() {
    let (cache, temp_dir) = create_cache(Ttl::Never);
    for key in ["user.42", "user.7", "user.8"] {
        assert!(cache.write(key, &json!({"key": key})));
    }

    assert!(cache.delete("user.42", true));

    assert!(!temp_dir.path().join("user").exists());
    for key in ["user.42", "user.7", "user.8"] {
        assert!(!cache.has(key, None));
    }
}

#[test]
fn test_corrupt_entry_is_a_miss() {
    let (cache, _temp_dir) = create_cache(Ttl::Never);
    std::fs::write(cache.path("broken"), "{not json").expect("Should write file");

    assert_eq!(cache.read::<Value>("broken", None, Some(json!(0))), Some(json!(0)));
    let result: Option<Value> = cache.get("broken", || Produced::Value(json!(5)), None);
    assert_eq!(result, Some(json!(5)));
    assert_eq!(cache.read::<Value>("broken", None, None), Some(json!(5)));
}
