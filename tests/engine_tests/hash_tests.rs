//! Tests for Hash Operations
//!
//! These tests verify:
//! - Field set/get/delete and the values they return
//! - Unchanged fields are not rewritten
//! - Multi-field HMSet/HMGet
//! - Clear, expiry and TTL of whole hashes

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosekv::{Config, DataType, Engine, RoseError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Arc<Engine>) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .dir_path(temp_dir.path())
        .merge_check_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn active_size(engine: &Engine) -> u64 {
    engine.segment_stats(DataType::Hash).unwrap().active_size
}

fn sorted(mut values: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    values.sort();
    values
}

// =============================================================================
// Field Tests
// =============================================================================

#[test]
fn test_hash_hset_return_values() {
    let (_dir, engine) = setup_temp_engine();

    assert_eq!(engine.hset(b"user", b"name", b"rose").unwrap(), 1);
    assert_eq!(engine.hset(b"user", b"name", b"lily").unwrap(), 0);
    assert_eq!(engine.hget(b"user", b"name").unwrap().as_deref(), Some(&b"lily"[..]));
}

#[test]
fn test_hash_unchanged_field_not_logged() {
    let (_dir, engine) = setup_temp_engine();

    engine.hset(b"h", b"f", b"v").unwrap();
    let before = active_size(&engine);

    assert_eq!(engine.hset(b"h", b"f", b"v").unwrap(), 0);
    assert_eq!(active_size(&engine), before);
}

#[test]
fn test_hash_hsetnx() {
    let (_dir, engine) = setup_temp_engine();

    assert!(engine.hsetnx(b"h", b"f", b"first").unwrap());
    assert!(!engine.hsetnx(b"h", b"f", b"second").unwrap());
    assert_eq!(engine.hget(b"h", b"f").unwrap().as_deref(), Some(&b"first"[..]));
}

#[test]
fn test_hash_get_missing() {
    let (_dir, engine) = setup_temp_engine();

    assert_eq!(engine.hget(b"h", b"f").unwrap(), None);
    engine.hset(b"h", b"f", b"v").unwrap();
    assert_eq!(engine.hget(b"h", b"other").unwrap(), None);
}

#[test]
fn test_hash_listing() {
    let (_dir, engine) = setup_temp_engine();
    engine.hset(b"h", b"a", b"1").unwrap();
    engine.hset(b"h", b"b", b"2").unwrap();

    assert_eq!(engine.hlen(b"h").unwrap(), 2);
    assert_eq!(sorted(engine.hkeys(b"h").unwrap()), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(sorted(engine.hvals(b"h").unwrap()), vec![b"1".to_vec(), b"2".to_vec()]);

    let mut all = engine.hget_all(b"h").unwrap();
    all.sort();
    assert_eq!(all, vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]);

    assert!(engine.hexists(b"h", b"a").unwrap());
    assert!(!engine.hexists(b"h", b"z").unwrap());
    assert!(engine.hkey_exists(b"h").unwrap());
}

#[test]
fn test_hash_hmset_hmget() {
    let (_dir, engine) = setup_temp_engine();

    engine.hmset(b"h", &[(b"a", b"1"), (b"b", b"2")]).unwrap();
    let values = engine.hmget(b"h", &[b"a", b"missing", b"b"]).unwrap();

    assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"2".to_vec())]);
    assert!(matches!(engine.hmset(b"h", &[]), Err(RoseError::WrongNumberArgs)));
}

#[test]
fn test_hash_hmset_skips_unchanged() {
    let (_dir, engine) = setup_temp_engine();
    engine.hmset(b"h", &[(b"a", b"1"), (b"b", b"2")]).unwrap();
    let before = active_size(&engine);

    engine.hmset(b"h", &[(b"a", b"1"), (b"b", b"3")]).unwrap();

    // Only the changed field was written
    let entry = 34 + 1 + 1 + 1;
    assert_eq!(active_size(&engine), before + entry);
}

#[test]
fn test_hash_field_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .dir_path(temp_dir.path())
        .max_key_size(8)
        .merge_check_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();
    let long_field = b"123456789";

    assert!(matches!(engine.hset(b"h", long_field, b"v"), Err(RoseError::KeyTooLarge)));
    assert!(matches!(engine.hsetnx(b"h", long_field, b"v"), Err(RoseError::KeyTooLarge)));

    // One oversize field rejects the whole batch
    let result = engine.hmset(b"h", &[(b"ok", b"v"), (long_field, b"v")]);
    assert!(matches!(result, Err(RoseError::KeyTooLarge)));

    assert_eq!(active_size(&engine), 0);
    assert!(!engine.hkey_exists(b"h").unwrap());
}

#[test]
fn test_hash_hdel() {
    let (_dir, engine) = setup_temp_engine();
    engine.hmset(b"h", &[(b"a", b"1"), (b"b", b"2")]).unwrap();

    assert_eq!(engine.hdel(b"h", &[b"a", b"missing"]).unwrap(), 1);
    assert_eq!(engine.hlen(b"h").unwrap(), 1);

    assert_eq!(engine.hdel(b"h", &[b"b"]).unwrap(), 1);
    assert!(!engine.hkey_exists(b"h").unwrap());
    assert!(matches!(engine.hdel(b"h", &[]), Err(RoseError::WrongNumberArgs)));
}

// =============================================================================
// Whole-Key Tests
// =============================================================================

#[test]
fn test_hash_hclear() {
    let (_dir, engine) = setup_temp_engine();
    engine.hmset(b"h", &[(b"a", b"1"), (b"b", b"2")]).unwrap();

    engine.hclear(b"h").unwrap();
    assert!(!engine.hkey_exists(b"h").unwrap());
    assert!(engine.hget_all(b"h").unwrap().is_empty());

    // Clearing a missing hash is silent
    engine.hclear(b"h").unwrap();
}

#[test]
fn test_hash_expire() {
    let (_dir, engine) = setup_temp_engine();
    engine.hset(b"h", b"f", b"v").unwrap();

    engine.hexpire(b"h", 1).unwrap();
    assert!(engine.httl(b"h").unwrap() <= 1);
    assert_eq!(engine.hget(b"h", b"f").unwrap().as_deref(), Some(&b"v"[..]));

    thread::sleep(Duration::from_millis(2100));

    assert_eq!(engine.hget(b"h", b"f").unwrap(), None);
    assert_eq!(engine.hlen(b"h").unwrap(), 0);
    assert!(!engine.hkey_exists(b"h").unwrap());
}

#[test]
fn test_hash_expire_errors() {
    let (_dir, engine) = setup_temp_engine();

    assert!(matches!(engine.hexpire(b"missing", 10), Err(RoseError::KeyNotExist)));

    engine.hset(b"h", b"f", b"v").unwrap();
    assert!(matches!(engine.hexpire(b"h", 0), Err(RoseError::InvalidTtl)));
    assert_eq!(engine.httl(b"h").unwrap(), 0);
}

#[test]
fn test_hash_ttl_counts_down() {
    let (_dir, engine) = setup_temp_engine();
    engine.hset(b"h", b"f", b"v").unwrap();

    engine.hexpire(b"h", 50).unwrap();
    let ttl = engine.httl(b"h").unwrap();
    assert!((49..=50).contains(&ttl), "ttl was {}", ttl);

    // A new field does not reset the deadline
    engine.hset(b"h", b"g", b"w").unwrap();
    assert!(engine.httl(b"h").unwrap() >= 49);
}
