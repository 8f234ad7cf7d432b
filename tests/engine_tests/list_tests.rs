//! Tests for List Operations
//!
//! These tests verify:
//! - Push/pop at both ends and the returned lengths
//! - Index, range, LRem, LInsert, LSet and LTrim through the engine
//! - Rejection of pivots containing the extra separator
//! - Clear, expiry and TTL of whole lists

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosekv::{Config, DataType, Engine, InsertOption, RoseError};
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

fn contents(engine: &Engine, key: &[u8]) -> Vec<String> {
    engine
        .lrange(key, 0, -1)
        .unwrap()
        .into_iter()
        .map(|v| String::from_utf8(v).unwrap())
        .collect()
}

// =============================================================================
// Push/Pop Tests
// =============================================================================

#[test]
fn test_list_push_lengths() {
    let (_dir, engine) = setup_temp_engine();

    assert_eq!(engine.rpush(b"l", &[b"a", b"b"]).unwrap(), 2);
    assert_eq!(engine.lpush(b"l", &[b"y", b"z"]).unwrap(), 4);

    // Each value is pushed in turn, so LPush reverses its arguments
    assert_eq!(contents(&engine, b"l"), vec!["z", "y", "a", "b"]);
    assert_eq!(engine.llen(b"l").unwrap(), 4);
}

#[test]
fn test_list_push_requires_values() {
    let (_dir, engine) = setup_temp_engine();
    assert!(matches!(engine.rpush(b"l", &[]), Err(RoseError::WrongNumberArgs)));
}

#[test]
fn test_list_pop_both_ends() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b", b"c"]).unwrap();

    assert_eq!(engine.lpop(b"l").unwrap().as_deref(), Some(&b"a"[..]));
    assert_eq!(engine.rpop(b"l").unwrap().as_deref(), Some(&b"c"[..]));
    assert_eq!(engine.rpop(b"l").unwrap().as_deref(), Some(&b"b"[..]));
    assert_eq!(engine.lpop(b"l").unwrap(), None);
    assert!(!engine.lkey_exists(b"l").unwrap());
}

#[test]
fn test_list_pop_missing_logs_nothing() {
    let (_dir, engine) = setup_temp_engine();

    assert_eq!(engine.lpop(b"missing").unwrap(), None);
    assert_eq!(engine.segment_stats(DataType::List).unwrap().active_size, 0);
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_list_lindex_and_lrange() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b", b"c", b"d"]).unwrap();

    assert_eq!(engine.lindex(b"l", 1).unwrap().as_deref(), Some(&b"b"[..]));
    assert_eq!(engine.lindex(b"l", -1).unwrap().as_deref(), Some(&b"d"[..]));
    assert_eq!(engine.lindex(b"l", 10).unwrap(), None);

    let middle = engine.lrange(b"l", 1, -2).unwrap();
    assert_eq!(middle, vec![b"b".to_vec(), b"c".to_vec()]);
    assert!(engine.lrange(b"missing", 0, -1).unwrap().is_empty());
}

#[test]
fn test_list_lval_exists() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a"]).unwrap();

    assert!(engine.lval_exists(b"l", b"a").unwrap());
    assert!(!engine.lval_exists(b"l", b"b").unwrap());
    assert!(!engine.lval_exists(b"missing", b"a").unwrap());
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_list_lrem() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"x", b"a", b"x", b"b", b"x"]).unwrap();

    assert_eq!(engine.lrem(b"l", b"x", -1).unwrap(), 1);
    assert_eq!(contents(&engine, b"l"), vec!["x", "a", "x", "b"]);

    assert_eq!(engine.lrem(b"l", b"x", 0).unwrap(), 2);
    assert_eq!(contents(&engine, b"l"), vec!["a", "b"]);

    let before = engine.segment_stats(DataType::List).unwrap().active_size;
    assert_eq!(engine.lrem(b"l", b"zzz", 0).unwrap(), 0);
    assert_eq!(engine.segment_stats(DataType::List).unwrap().active_size, before);
}

#[test]
fn test_list_linsert() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"c"]).unwrap();

    assert_eq!(engine.linsert(b"l", InsertOption::Before, b"c", b"b").unwrap(), Some(3));
    assert_eq!(engine.linsert(b"l", InsertOption::After, b"c", b"d").unwrap(), Some(4));
    assert_eq!(engine.linsert(b"l", InsertOption::After, b"nope", b"e").unwrap(), None);

    assert_eq!(contents(&engine, b"l"), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_list_linsert_pivot_with_separator() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a"]).unwrap();

    let result = engine.linsert(b"l", InsertOption::After, b"bad\\0pivot", b"v");
    assert!(matches!(result, Err(RoseError::ExtraContainsSeparator)));
}

#[test]
fn test_list_linsert_pivot_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .dir_path(temp_dir.path())
        .max_value_size(4)
        .merge_check_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();
    engine.rpush(b"l", &[b"a"]).unwrap();
    let before = engine.segment_stats(DataType::List).unwrap().active_size;

    let result = engine.linsert(b"l", InsertOption::Before, b"12345", b"v");
    assert!(matches!(result, Err(RoseError::ValueTooLarge)));
    assert_eq!(engine.segment_stats(DataType::List).unwrap().active_size, before);
    assert_eq!(contents(&engine, b"l"), vec!["a"]);
}

#[test]
fn test_list_lset() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b"]).unwrap();

    assert!(engine.lset(b"l", 0, b"A").unwrap());
    assert!(engine.lset(b"l", -1, b"B").unwrap());
    assert!(!engine.lset(b"l", 5, b"C").unwrap());
    assert!(matches!(engine.lset(b"missing", 0, b"v"), Err(RoseError::KeyNotExist)));

    assert_eq!(contents(&engine, b"l"), vec!["A", "B"]);
}

#[test]
fn test_list_ltrim() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b", b"c", b"d"]).unwrap();

    engine.ltrim(b"l", 1, 2).unwrap();
    assert_eq!(contents(&engine, b"l"), vec!["b", "c"]);

    // Trimming a missing key is a silent no-op
    engine.ltrim(b"missing", 0, 1).unwrap();
    assert!(!engine.lkey_exists(b"missing").unwrap());

    engine.ltrim(b"l", 5, 9).unwrap();
    assert!(!engine.lkey_exists(b"l").unwrap());
}

#[test]
fn test_list_lclear() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b"]).unwrap();

    engine.lclear(b"l").unwrap();
    assert!(!engine.lkey_exists(b"l").unwrap());
    assert_eq!(engine.llen(b"l").unwrap(), 0);
    assert!(matches!(engine.lclear(b"l"), Err(RoseError::KeyNotExist)));
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_list_expire() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a", b"b"]).unwrap();

    engine.lexpire(b"l", 1).unwrap();
    let ttl = engine.lttl(b"l").unwrap();
    assert!((0..=1).contains(&ttl), "ttl was {}", ttl);

    thread::sleep(Duration::from_millis(2100));

    assert!(!engine.lkey_exists(b"l").unwrap());
    assert!(engine.lrange(b"l", 0, -1).unwrap().is_empty());
    assert_eq!(engine.lttl(b"l").unwrap(), 0);

    // The key starts fresh after expiring
    assert_eq!(engine.rpush(b"l", &[b"c"]).unwrap(), 1);
    assert_eq!(engine.lttl(b"l").unwrap(), 0);
}

#[test]
fn test_list_expire_errors() {
    let (_dir, engine) = setup_temp_engine();

    assert!(matches!(engine.lexpire(b"missing", 10), Err(RoseError::KeyNotExist)));

    engine.rpush(b"l", &[b"a"]).unwrap();
    assert!(matches!(engine.lexpire(b"l", 0), Err(RoseError::InvalidTtl)));
}

#[test]
fn test_list_emptied_key_drops_deadline() {
    let (_dir, engine) = setup_temp_engine();
    engine.rpush(b"l", &[b"a"]).unwrap();
    engine.lexpire(b"l", 100).unwrap();

    engine.lpop(b"l").unwrap();
    engine.rpush(b"l", &[b"b"]).unwrap();

    assert_eq!(engine.lttl(b"l").unwrap(), 0);
}
