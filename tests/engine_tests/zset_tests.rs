//! Tests for Sorted Set Operations
//!
//! These tests verify:
//! - ZAdd/ZScore/ZRem and that rescoring keeps one entry per member
//! - Rank lookups in both directions agree with ZRange
//! - ZIncrBy on present and absent members
//! - Rank ranges, score ranges and by-rank lookups
//! - Clear, expiry and TTL of whole sorted sets

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

fn leaderboard(engine: &Engine) {
    engine.zadd(b"board", 30.0, b"carol").unwrap();
    engine.zadd(b"board", 10.0, b"alice").unwrap();
    engine.zadd(b"board", 20.0, b"bob").unwrap();
    engine.zadd(b"board", 40.0, b"dave").unwrap();
}

fn names(members: Vec<Vec<u8>>) -> Vec<String> {
    members.into_iter().map(|m| String::from_utf8(m).unwrap()).collect()
}

// =============================================================================
// Member Tests
// =============================================================================

#[test]
fn test_zset_zadd_zscore() {
    let (_dir, engine) = setup_temp_engine();

    engine.zadd(b"z", 1.5, b"a").unwrap();
    assert_eq!(engine.zscore(b"z", b"a").unwrap(), Some(1.5));
    assert_eq!(engine.zscore(b"z", b"b").unwrap(), None);

    engine.zadd(b"z", -2.0, b"a").unwrap();
    assert_eq!(engine.zscore(b"z", b"a").unwrap(), Some(-2.0));
    assert_eq!(engine.zcard(b"z").unwrap(), 1);
}

#[test]
fn test_zset_same_score_not_logged() {
    let (_dir, engine) = setup_temp_engine();

    engine.zadd(b"z", 1.0, b"a").unwrap();
    let before = engine.segment_stats(DataType::ZSet).unwrap().active_size;

    engine.zadd(b"z", 1.0, b"a").unwrap();
    assert_eq!(engine.segment_stats(DataType::ZSet).unwrap().active_size, before);
}

#[test]
fn test_zset_zrem() {
    let (_dir, engine) = setup_temp_engine();
    engine.zadd(b"z", 1.0, b"a").unwrap();

    assert!(engine.zrem(b"z", b"a").unwrap());
    assert!(!engine.zrem(b"z", b"a").unwrap());
    assert!(!engine.zkey_exists(b"z").unwrap());
}

#[test]
fn test_zset_zincr_by() {
    let (_dir, engine) = setup_temp_engine();

    assert_eq!(engine.zincr_by(b"z", 5.0, b"a").unwrap(), 5.0);
    assert_eq!(engine.zincr_by(b"z", -1.5, b"a").unwrap(), 3.5);
    assert_eq!(engine.zscore(b"z", b"a").unwrap(), Some(3.5));
}

#[test]
fn test_zset_fractional_scores_survive_encoding() {
    let (dir, engine) = setup_temp_engine();
    let score = 0.1 + 0.2;
    engine.zadd(b"z", score, b"a").unwrap();
    engine.close().unwrap();
    drop(engine);

    let config = Config::builder()
        .dir_path(dir.path())
        .merge_check_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.zscore(b"z", b"a").unwrap(), Some(score));
}

// =============================================================================
// Rank Tests
// =============================================================================

#[test]
fn test_zset_ranks() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    assert_eq!(engine.zrank(b"board", b"alice").unwrap(), Some(0));
    assert_eq!(engine.zrank(b"board", b"dave").unwrap(), Some(3));
    assert_eq!(engine.zrev_rank(b"board", b"dave").unwrap(), Some(0));
    assert_eq!(engine.zrev_rank(b"board", b"alice").unwrap(), Some(3));
    assert_eq!(engine.zrank(b"board", b"nobody").unwrap(), None);
}

#[test]
fn test_zset_rank_agrees_with_range() {
    let (_dir, engine) = setup_temp_engine();
    for i in 0..100u32 {
        let score = f64::from((i * 37) % 101);
        engine.zadd(b"z", score, format!("m{}", i).as_bytes()).unwrap();
    }

    let ranked = engine.zrange_with_scores(b"z", 0, -1).unwrap();
    assert_eq!(ranked.len(), 100);
    for (rank, (member, score)) in ranked.iter().enumerate() {
        assert_eq!(engine.zrank(b"z", member).unwrap(), Some(rank));
        assert_eq!(engine.zget_by_rank(b"z", rank).unwrap(), Some((member.clone(), *score)));
    }
    for pair in ranked.windows(2) {
        assert!(pair[0].1 <= pair[1].1);
    }
}

#[test]
fn test_zset_zrange_variants() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    assert_eq!(names(engine.zrange(b"board", 0, 1).unwrap()), vec!["alice", "bob"]);
    assert_eq!(names(engine.zrange(b"board", -2, -1).unwrap()), vec!["carol", "dave"]);
    assert_eq!(names(engine.zrev_range(b"board", 0, 1).unwrap()), vec!["dave", "carol"]);

    let scored = engine.zrev_range_with_scores(b"board", 0, 0).unwrap();
    assert_eq!(scored, vec![(b"dave".to_vec(), 40.0)]);

    assert!(engine.zrange(b"board", 10, 20).unwrap().is_empty());
    assert!(engine.zrange(b"missing", 0, -1).unwrap().is_empty());
}

#[test]
fn test_zset_get_by_rank() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    assert_eq!(engine.zget_by_rank(b"board", 1).unwrap(), Some((b"bob".to_vec(), 20.0)));
    assert_eq!(engine.zrev_get_by_rank(b"board", 1).unwrap(), Some((b"carol".to_vec(), 30.0)));
    assert_eq!(engine.zget_by_rank(b"board", 4).unwrap(), None);
}

#[test]
fn test_zset_score_ranges() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    let mid = engine.zscore_range(b"board", 15.0, 35.0).unwrap();
    assert_eq!(mid, vec![(b"bob".to_vec(), 20.0), (b"carol".to_vec(), 30.0)]);

    let rev = engine.zrev_score_range(b"board", 35.0, 15.0).unwrap();
    assert_eq!(rev, vec![(b"carol".to_vec(), 30.0), (b"bob".to_vec(), 20.0)]);

    assert_eq!(engine.zscore_range(b"board", f64::MIN, f64::MAX).unwrap().len(), 4);
    assert!(engine.zscore_range(b"board", 41.0, 50.0).unwrap().is_empty());
}

// =============================================================================
// Whole-Key Tests
// =============================================================================

#[test]
fn test_zset_zclear() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    engine.zclear(b"board").unwrap();
    assert_eq!(engine.zcard(b"board").unwrap(), 0);
    assert!(!engine.zkey_exists(b"board").unwrap());
}

#[test]
fn test_zset_expire() {
    let (_dir, engine) = setup_temp_engine();
    leaderboard(&engine);

    engine.zexpire(b"board", 1).unwrap();
    assert!(engine.zttl(b"board").unwrap() <= 1);

    thread::sleep(Duration::from_millis(2100));

    assert_eq!(engine.zscore(b"board", b"alice").unwrap(), None);
    assert_eq!(engine.zcard(b"board").unwrap(), 0);
    assert_eq!(engine.zttl(b"board").unwrap(), 0);
}

#[test]
fn test_zset_expire_errors() {
    let (_dir, engine) = setup_temp_engine();

    assert!(matches!(engine.zexpire(b"missing", 5), Err(RoseError::KeyNotExist)));
    engine.zadd(b"z", 1.0, b"a").unwrap();
    assert!(matches!(engine.zexpire(b"z", 0), Err(RoseError::InvalidTtl)));
}
