//! Tests for Recovery
//!
//! These tests verify:
//! - Every data type is rebuilt from its segments on reopen
//! - Reopening repeatedly yields the same state
//! - Deadlines survive a reopen, and expired keys stay gone
//! - Recovery across rotated segments and in mmap mode
//! - Corrupted or truncated segments make open fail

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosekv::storage::{segment_path, ENTRY_HEADER_SIZE};
use rosekv::{Config, DataType, Engine, IndexMode, InsertOption, RoseError, RwMethod};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &Path) -> Config {
    Config::builder()
        .dir_path(dir)
        .merge_check_interval(Duration::from_secs(3600))
        .build()
}

fn reopen(engine: Arc<Engine>, config: Config) -> Arc<Engine> {
    engine.close().unwrap();
    drop(engine);
    Engine::open(config).unwrap()
}

/// One of everything, with some history to replay
fn populate(engine: &Engine) {
    engine.set(b"s:a", b"1").unwrap();
    engine.set(b"s:b", b"2").unwrap();
    engine.set(b"s:a", b"3").unwrap();
    engine.remove(b"s:b").unwrap();
    engine.append(b"s:c", b"xy").unwrap();

    engine.rpush(b"l", &[b"a", b"b", b"c", b"d"]).unwrap();
    engine.lpop(b"l").unwrap();
    engine.linsert(b"l", InsertOption::Before, b"c", b"bb").unwrap();
    engine.lset(b"l", -1, b"D").unwrap();
    engine.lrem(b"l", b"b", 1).unwrap();

    engine.hset(b"h", b"f1", b"v1").unwrap();
    engine.hset(b"h", b"f2", b"v2").unwrap();
    engine.hdel(b"h", &[b"f1"]).unwrap();

    engine.sadd(b"s1", &[b"x", b"y", b"z"]).unwrap();
    engine.srem(b"s1", &[b"y"]).unwrap();
    engine.smove(b"s1", b"s2", b"z").unwrap();

    engine.zadd(b"z", 3.0, b"c").unwrap();
    engine.zadd(b"z", 1.0, b"a").unwrap();
    engine.zincr_by(b"z", 5.0, b"a").unwrap();
    engine.zadd(b"z", 2.0, b"b").unwrap();
    engine.zrem(b"z", b"b").unwrap();
}

fn assert_populated(engine: &Engine) {
    assert_eq!(engine.get(b"s:a").unwrap(), b"3");
    assert!(matches!(engine.get(b"s:b"), Err(RoseError::KeyNotExist)));
    assert_eq!(engine.get(b"s:c").unwrap(), b"xy");

    let list = engine.lrange(b"l", 0, -1).unwrap();
    assert_eq!(list, vec![b"bb".to_vec(), b"c".to_vec(), b"D".to_vec()]);

    assert_eq!(engine.hget(b"h", b"f1").unwrap(), None);
    assert_eq!(engine.hget(b"h", b"f2").unwrap().as_deref(), Some(&b"v2"[..]));

    assert_eq!(engine.smembers(b"s1").unwrap(), vec![b"x".to_vec()]);
    assert_eq!(engine.smembers(b"s2").unwrap(), vec![b"z".to_vec()]);

    let ranked = engine.zrange_with_scores(b"z", 0, -1).unwrap();
    assert_eq!(ranked, vec![(b"c".to_vec(), 3.0), (b"a".to_vec(), 6.0)]);
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_recovery_all_types() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    populate(&engine);
    assert_populated(&engine);

    let engine = reopen(engine, config(temp_dir.path()));
    assert_populated(&engine);
}

#[test]
fn test_recovery_is_repeatable() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = Engine::open(config(temp_dir.path())).unwrap();
    populate(&engine);

    let sizes: Vec<u64> = DataType::ALL
        .iter()
        .map(|&t| engine.segment_stats(t).unwrap().active_size)
        .collect();

    for _ in 0..3 {
        engine = reopen(engine, config(temp_dir.path()));
        assert_populated(&engine);

        // Replay writes nothing
        let after: Vec<u64> = DataType::ALL
            .iter()
            .map(|&t| engine.segment_stats(t).unwrap().active_size)
            .collect();
        assert_eq!(after, sizes);
    }
}

#[test]
fn test_recovery_without_close() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp_dir.path())).unwrap();
        populate(&engine);
        engine.sync().unwrap();
    }

    let engine = Engine::open(config(temp_dir.path())).unwrap();
    assert_populated(&engine);
}

#[test]
fn test_recovery_across_rotated_segments() {
    let temp_dir = TempDir::new().unwrap();
    let small = Config::builder()
        .dir_path(temp_dir.path())
        .block_size(256)
        .merge_check_interval(Duration::from_secs(3600))
        .build();

    let engine = Engine::open(small.clone()).unwrap();
    for i in 0..100 {
        engine.set(format!("key{:03}", i).as_bytes(), format!("value{:03}", i).as_bytes()).unwrap();
    }
    assert!(engine.segment_stats(DataType::String).unwrap().archived_ids.len() > 5);

    let engine = reopen(engine, small);
    for i in 0..100 {
        assert_eq!(engine.get(format!("key{:03}", i).as_bytes()).unwrap(), format!("value{:03}", i).into_bytes());
    }
}

#[test]
fn test_recovery_mmap_mode() {
    let temp_dir = TempDir::new().unwrap();
    let mmap = Config::builder()
        .dir_path(temp_dir.path())
        .rw_method(RwMethod::MMap)
        .block_size(1024)
        .merge_check_interval(Duration::from_secs(3600))
        .build();

    let engine = Engine::open(mmap.clone()).unwrap();
    populate(&engine);
    for i in 0..50 {
        engine.hset(b"big", format!("f{}", i).as_bytes(), b"some value").unwrap();
    }
    assert!(!engine.segment_stats(DataType::Hash).unwrap().archived_ids.is_empty());

    let engine = reopen(engine, mmap);
    assert_populated(&engine);
    assert_eq!(engine.hlen(b"big").unwrap(), 50);
}

#[test]
fn test_recovery_key_only_mode() {
    let temp_dir = TempDir::new().unwrap();
    let key_only = Config::builder()
        .dir_path(temp_dir.path())
        .idx_mode(IndexMode::KeyOnlyMem)
        .cache_capacity(8)
        .merge_check_interval(Duration::from_secs(3600))
        .build();

    let engine = Engine::open(key_only.clone()).unwrap();
    populate(&engine);

    let engine = reopen(engine, key_only);
    assert_populated(&engine);
}

// =============================================================================
// Expiry Recovery Tests
// =============================================================================

#[test]
fn test_recovery_keeps_deadlines() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.set_ex(b"k", b"v", 100).unwrap();
    engine.hset(b"h", b"f", b"v").unwrap();
    engine.hexpire(b"h", 100).unwrap();
    engine.zadd(b"z", 1.0, b"m").unwrap();
    engine.zexpire(b"z", 100).unwrap();

    let engine = reopen(engine, config(temp_dir.path()));

    assert!(engine.ttl(b"k").unwrap() >= 98);
    assert!(engine.httl(b"h").unwrap() >= 98);
    assert!(engine.zttl(b"z").unwrap() >= 98);
}

#[test]
fn test_recovery_expired_string() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.set_ex(b"k", b"v", 1).unwrap();

    thread::sleep(Duration::from_millis(2100));
    assert!(matches!(engine.get(b"k"), Err(RoseError::KeyExpired)));

    let engine = reopen(engine, config(temp_dir.path()));
    assert!(matches!(engine.get(b"k"), Err(RoseError::KeyNotExist)));
}

#[test]
fn test_recovery_expires_while_closed() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.set_ex(b"k", b"v", 1).unwrap();
    engine.sadd(b"s", &[b"m"]).unwrap();
    engine.sexpire(b"s", 1).unwrap();
    engine.close().unwrap();
    drop(engine);

    thread::sleep(Duration::from_millis(2100));

    let engine = Engine::open(config(temp_dir.path())).unwrap();
    assert!(matches!(engine.get(b"k"), Err(RoseError::KeyExpired)));
    assert!(!engine.skey_exists(b"s").unwrap());
}

#[test]
fn test_recovery_persist_survives() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.set_ex(b"k", b"v", 1).unwrap();
    engine.persist(b"k").unwrap();

    thread::sleep(Duration::from_millis(2100));

    let engine = reopen(engine, config(temp_dir.path()));
    assert_eq!(engine.get(b"k").unwrap(), b"v");
    assert_eq!(engine.ttl(b"k").unwrap(), 0);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_recovery_corrupted_value_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.set(b"key", b"value").unwrap();
    engine.close().unwrap();
    drop(engine);

    let path = segment_path(temp_dir.path(), 0, DataType::String);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[ENTRY_HEADER_SIZE + 3] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let result = Engine::open(config(temp_dir.path()));
    assert!(matches!(result, Err(RoseError::InvalidCrc { .. })));
}

#[test]
fn test_recovery_truncated_tail_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path())).unwrap();
    engine.rpush(b"l", &[b"a", b"b"]).unwrap();
    engine.close().unwrap();
    drop(engine);

    let path = segment_path(temp_dir.path(), 0, DataType::List);
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x11; 10]).unwrap();
    drop(file);

    let result = Engine::open(config(temp_dir.path()));
    assert!(matches!(result, Err(RoseError::InvalidEntry(_))));
}
