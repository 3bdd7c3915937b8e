//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN assignment, including across reopen and resume
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Explicit timestamps for checkpoint rewrites
//! - Truncation and length tracking

use std::path::PathBuf;

use burrowkv::config::WalSyncStrategy;
use burrowkv::wal::{Operation, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal.log");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

// =============================================================================
// LSN Tests
// =============================================================================

#[test]
fn test_lsns_start_at_one() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(Operation::Touch { key: b"a".to_vec() }).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_reopen_continues_numbering() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(put("b", "2")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
}

#[test]
fn test_resume_uses_given_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::resume(&wal_path, WalSyncStrategy::EveryWrite, 40).unwrap();

    assert_eq!(writer.append(put("a", "1")).unwrap(), 40);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_write_leaves_nothing_uncommitted() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put("a", "1")).unwrap();

    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_every_n_entries_syncs_on_nth() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(put("c", "3")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_manual_sync_makes_entries_readable() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 1000 }).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.sync().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.next_entry().unwrap().unwrap().operation, put("a", "1"));
}

// =============================================================================
// Timestamp / Length / Truncate Tests
// =============================================================================

#[test]
fn test_append_at_keeps_timestamp() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append_at(&put("a", "1"), 1_234).unwrap();

    let entry = WalReader::open(&wal_path).unwrap().next_entry().unwrap().unwrap();
    assert_eq!(entry.timestamp, 1_234);
}

#[test]
fn test_len_matches_file_after_sync() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert!(writer.is_empty());

    writer.append(put("key", "value")).unwrap();
    writer.append(Operation::Delete { key: b"key".to_vec() }).unwrap();

    assert_eq!(writer.len(), std::fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_truncate_resets_log() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();

    writer.truncate().unwrap();

    assert!(writer.is_empty());
    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(put("c", "3")).unwrap(), 1);
}

#[test]
fn test_create_replaces_existing_log() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("old", "x")).unwrap();
    }

    let writer = WalWriter::create(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert!(writer.is_empty());
    assert_eq!(writer.path(), wal_path.as_path());
    assert!(WalReader::open(&wal_path).unwrap().next_entry().unwrap().is_none());
}
