//! Tests for Engine
//!
//! These tests verify:
//! - Single-key write/stat/read_at/delete
//! - Last-used stamping on reads
//! - Crash recovery from the WAL
//! - Transaction commits (atomic batch + snapshot)
//! - Limits and LRU eviction
//! - WAL checkpointing
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use burrowkv::config::{Config, Limits, WalSyncStrategy};
use burrowkv::engine::Engine;
use burrowkv::transaction::{ReaderState, StagedKey, Transaction};
use burrowkv::BurrowError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn read_all(engine: &Engine, key: &[u8]) -> Vec<u8> {
    let size = engine.stat(key).unwrap().size as usize;
    let mut buf = vec![0u8; size];
    let n = engine.read_at(key, &mut buf, 0).unwrap();
    buf.truncate(n);
    buf
}

fn staged_write(key: &str, value: &str) -> StagedKey {
    StagedKey {
        key: key.as_bytes().to_vec(),
        write: Some(value.as_bytes().to_vec()),
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let (temp_dir, engine) = setup_temp_engine();

    assert!(temp_dir.path().join("snapshots").is_dir());
    assert_eq!(engine.snapshot_dir(), temp_dir.path().join("snapshots"));
    assert_eq!(engine.wal_path(), temp_dir.path().join("wal.log"));
}

#[test]
fn test_engine_write_stat_read() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(engine.write(b"key", b"hello").unwrap(), 5);

    assert_eq!(engine.stat(b"key").unwrap().size, 5);
    assert_eq!(read_all(&engine, b"key"), b"hello");
}

#[test]
fn test_engine_read_at_offset() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"key", b"0123456789").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(engine.read_at(b"key", &mut buf, 8).unwrap(), 2);
    assert_eq!(&buf[..2], b"89");
    assert_eq!(engine.read_at(b"key", &mut buf, 10).unwrap(), 0);
}

#[test]
fn test_engine_read_missing_key() {
    let (_temp, engine) = setup_temp_engine();
    let mut buf = [0u8; 4];

    assert!(matches!(
        engine.read_at(b"missing", &mut buf, 0),
        Err(BurrowError::KeyNotFound)
    ));
}

#[test]
fn test_engine_read_refreshes_last_used() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"key", b"v").unwrap();
    let before = engine.stat(b"key").unwrap().last_used;

    thread::sleep(Duration::from_millis(5));
    let mut buf = [0u8; 1];
    engine.read_at(b"key", &mut buf, 0).unwrap();

    assert!(engine.stat(b"key").unwrap().last_used > before);
}

#[test]
fn test_engine_delete_returns_stat() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"key", b"abc").unwrap();

    let stat = engine.delete(b"key").unwrap().unwrap();

    assert_eq!(stat.size, 3);
    assert!(engine.stat(b"key").is_none());
    assert!(engine.delete(b"key").unwrap().is_none());
}

#[test]
fn test_engine_list_items() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"a/1", b"x").unwrap();
    engine.write(b"a/2", b"yy").unwrap();
    engine.write(b"b/1", b"z").unwrap();

    let items = engine.list_items(b"a/");

    assert_eq!(items.len(), 2);
    assert_eq!(items[1].key, b"a/2");
    assert_eq!(items[1].stat.size, 2);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_engine_recovery_from_wal() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
        engine.write(b"kept", b"value").unwrap();
        engine.write(b"removed", b"value").unwrap();
        engine.delete(b"removed").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();

    assert_eq!(read_all(&engine, b"kept"), b"value");
    assert!(engine.stat(b"removed").is_none());
    assert_eq!(engine.entry_count(), 1);
}

#[test]
fn test_engine_recovery_preserves_last_used() {
    let temp_dir = TempDir::new().unwrap();
    let before = {
        let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
        engine.write(b"key", b"value").unwrap();
        engine.stat(b"key").unwrap().last_used
    };

    thread::sleep(Duration::from_millis(5));
    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();

    assert_eq!(engine.stat(b"key").unwrap().last_used, before);
}

#[test]
fn test_engine_recovery_after_torn_append() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
        engine.write(b"a", b"1").unwrap();
    }

    // Simulate a crash mid-append
    let wal_path = temp_dir.path().join("wal.log");
    let mut bytes = std::fs::read(&wal_path).unwrap();
    bytes.extend_from_slice(&[0x07; 11]);
    std::fs::write(&wal_path, &bytes).unwrap();

    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
    engine.write(b"b", b"2").unwrap();
    drop(engine);

    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
    assert_eq!(read_all(&engine, b"a"), b"1");
    assert_eq!(read_all(&engine, b"b"), b"2");
}

#[test]
fn test_engine_open_path_convenience() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();

    assert_eq!(engine.data_dir(), temp_dir.path());
    assert_eq!(engine.limits(), Limits::unlimited());
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_engine_commit_applies_all_writes() {
    let (_temp, engine) = setup_temp_engine();

    let snapshot = engine
        .commit(vec![staged_write("a", "1"), staged_write("b", "22")])
        .unwrap();

    assert_eq!(engine.stat(b"a").unwrap().size, 1);
    assert_eq!(engine.stat(b"b").unwrap().size, 2);
    assert_eq!(snapshot.get(b"b").unwrap().value.as_ref(), b"22");
}

#[test]
fn test_engine_commit_is_one_wal_entry() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
        engine
            .commit(vec![staged_write("a", "1"), staged_write("b", "2"), staged_write("c", "3")])
            .unwrap();
    }

    let (entries, _) =
        burrowkv::wal::WalRecovery::recover(&temp_dir.path().join("wal.log")).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation.len(), 3);
}

#[test]
fn test_engine_snapshot_ignores_later_writes() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"key", b"old").unwrap();

    let snapshot = engine
        .commit(vec![StagedKey {
            key: b"key".to_vec(),
            write: None,
        }])
        .unwrap();
    engine.write(b"key", b"newer").unwrap();
    engine.delete(b"key").unwrap();

    assert_eq!(snapshot.get(b"key").unwrap().value.as_ref(), b"old");
    assert!(engine.stat(b"key").is_none());
}

#[test]
fn test_transaction_add_missing_key() {
    let (_temp, engine) = setup_temp_engine();
    let mut txn = Transaction::new(Arc::new(engine));

    assert!(matches!(txn.add(b"missing"), Err(BurrowError::KeyNotFound)));
    assert_eq!(txn.state(), ReaderState::Created);
}

#[test]
fn test_transaction_add_after_put_of_same_key() {
    let (_temp, engine) = setup_temp_engine();
    let mut txn = Transaction::new(Arc::new(engine));

    txn.put(b"fresh", b"value").unwrap();
    txn.add(b"fresh").unwrap();
    let snapshot = txn.begin().unwrap();

    assert_eq!(snapshot.get(b"fresh").unwrap().value.as_ref(), b"value");
}

#[test]
fn test_transaction_state_machine() {
    let (_temp, engine) = setup_temp_engine();
    let mut txn = Transaction::new(Arc::new(engine));
    assert_eq!(txn.state(), ReaderState::Created);

    txn.put(b"k", b"v").unwrap();
    assert_eq!(txn.state(), ReaderState::Staging);
    assert!(txn.list_items(b"").is_err());

    txn.begin().unwrap();
    assert_eq!(txn.state(), ReaderState::Committed);
    assert!(matches!(
        txn.put(b"k2", b"v"),
        Err(BurrowError::ReaderState { actual: ReaderState::Committed, .. })
    ));
    assert!(txn.begin().is_err());
    assert_eq!(txn.list_items(b"").unwrap().len(), 1);

    txn.end().unwrap();
    assert_eq!(txn.state(), ReaderState::Ended);
    assert!(txn.snapshot().is_none());
    assert!(txn.end().is_err());
}

#[test]
fn test_transaction_empty_begin() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"existing", b"v").unwrap();
    let mut txn = Transaction::new(Arc::new(engine));

    txn.begin().unwrap();

    assert_eq!(txn.list_items(b"").unwrap().len(), 1);
}

// =============================================================================
// Limits Tests
// =============================================================================

#[test]
fn test_engine_evicts_least_recently_used() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"first", b"aaaa").unwrap();
    thread::sleep(Duration::from_millis(2));
    engine.write(b"second", b"bbbb").unwrap();
    thread::sleep(Duration::from_millis(2));

    engine.set_limits(Limits::unlimited().with_max_value_length_sum(10));
    engine.write(b"third", b"cccc").unwrap();

    assert!(engine.stat(b"first").is_none());
    assert!(engine.stat(b"second").is_some());
    assert!(engine.stat(b"third").is_some());
    assert_eq!(engine.value_length_sum(), 8);
}

#[test]
fn test_engine_read_protects_from_eviction() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"first", b"aaaa").unwrap();
    thread::sleep(Duration::from_millis(2));
    engine.write(b"second", b"bbbb").unwrap();
    thread::sleep(Duration::from_millis(2));

    let mut buf = [0u8; 1];
    engine.read_at(b"first", &mut buf, 0).unwrap();
    thread::sleep(Duration::from_millis(2));

    engine.set_limits(Limits::unlimited().with_max_value_length_sum(10));
    engine.write(b"third", b"cccc").unwrap();

    assert!(engine.stat(b"first").is_some());
    assert!(engine.stat(b"second").is_none());
}

#[test]
fn test_engine_set_limits_does_not_evict_immediately() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"a", b"aaaa").unwrap();
    engine.write(b"b", b"bbbb").unwrap();

    engine.set_limits(Limits::unlimited().with_max_value_length_sum(1));

    assert_eq!(engine.entry_count(), 2);
    assert_eq!(engine.limits().max_value_length_sum, Some(1));
}

#[test]
fn test_engine_eviction_spares_snapshot() {
    let (_temp, engine) = setup_temp_engine();
    engine.write(b"old", b"aaaa").unwrap();
    let snapshot = engine.commit(Vec::new()).unwrap();
    thread::sleep(Duration::from_millis(2));

    engine.set_limits(Limits::unlimited().with_max_value_length_sum(4));
    engine.write(b"new", b"bbbb").unwrap();

    assert!(engine.stat(b"old").is_none());
    assert_eq!(snapshot.get(b"old").unwrap().value.as_ref(), b"aaaa");
}

#[test]
fn test_engine_eviction_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
        engine.write(b"old", b"aaaa").unwrap();
        thread::sleep(Duration::from_millis(2));
        engine.set_limits(Limits::unlimited().with_max_value_length_sum(4));
        engine.write(b"new", b"bbbb").unwrap();
    }

    let engine = Engine::open(setup_temp_config(&temp_dir)).unwrap();
    assert!(engine.stat(b"old").is_none());
    assert!(engine.stat(b"new").is_some());
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_engine_checkpoint_shrinks_wal() {
    let (temp_dir, engine) = setup_temp_engine();
    for i in 0..50 {
        engine.write(b"hot", format!("value{}", i).as_bytes()).unwrap();
    }
    let before = engine.wal_len();

    engine.checkpoint().unwrap();

    assert!(engine.wal_len() < before);
    assert_eq!(read_all(&engine, b"hot"), b"value49");
    assert!(!temp_dir.path().join("wal.log.checkpoint").exists());
}

#[test]
fn test_engine_auto_checkpoint_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .compact_threshold(512)
        .build();
    {
        let engine = Engine::open(config.clone()).unwrap();
        for i in 0..100 {
            engine.write(format!("key{}", i % 10).as_bytes(), b"0123456789").unwrap();
        }
        assert!(engine.wal_len() < 2048);
    }

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.entry_count(), 10);
    assert_eq!(read_all(&engine, b"key7"), b"0123456789");
}

#[test]
fn test_engine_mutations_stand_when_checkpoint_fails() {
    let temp_dir = TempDir::new().unwrap();
    // A directory in the way makes every checkpoint attempt fail
    std::fs::create_dir(temp_dir.path().join("wal.log.checkpoint")).unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .compact_threshold(64)
        .build();
    let value = vec![b'v'; 70];

    {
        let engine = Engine::open(config.clone()).unwrap();
        assert_eq!(engine.write(b"big", &value).unwrap(), 70);
        assert_eq!(engine.stat(b"big").unwrap().size, 70);
        assert_eq!(engine.write(b"small", b"x").unwrap(), 1);
        assert_eq!(engine.delete(b"small").unwrap().unwrap().size, 1);
        engine.commit(vec![staged_write("t", "v")]).unwrap();
        assert!(engine.checkpoint().is_err());
    }

    std::fs::remove_dir(temp_dir.path().join("wal.log.checkpoint")).unwrap();
    let engine = Engine::open(config).unwrap();
    assert_eq!(read_all(&engine, b"big"), value);
    assert_eq!(read_all(&engine, b"t"), b"v");
    assert!(engine.stat(b"small").is_none());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writes() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("thread{}_key{}", t, i);
                    engine.write(key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.entry_count(), 100);
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_engine_empty_key_and_value() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(engine.write(b"", b"").unwrap(), 0);

    assert_eq!(engine.stat(b"").unwrap().size, 0);
}

#[test]
fn test_engine_binary_data() {
    let (_temp, engine) = setup_temp_engine();
    let value: Vec<u8> = (0..=255).collect();

    engine.write(&[0x00, 0xFF], &value).unwrap();

    assert_eq!(read_all(&engine, &[0x00, 0xFF]), value);
}
