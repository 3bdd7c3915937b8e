//! Engine Module
//!
//! The reference storage engine that sits behind the boundary in `sys`.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable and snapshot markers
//! - Handle concurrent read/write access
//! - Stamp last-used times and evict under instance limits
//! - Checkpoint the WAL once it outgrows its threshold
//! - Manage crash recovery on startup

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, Limits, WalSyncStrategy};
use crate::error::{BurrowError, Result};
use crate::item::{now_millis, Item, Stat, Timestamp};
use crate::memtable::MemTable;
use crate::snapshot::{self, Snapshot, SnapshotMarker, SNAPSHOT_DIR};
use crate::transaction::StagedKey;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The reference storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Mutations** (write/delete/touch/commit/checkpoint): serialized by
///   `write_lock`. Order: write_lock → WAL → memtable.
/// - **Reads** (stat/list/read_at): concurrent at the MemTable level. A read
///   that touches its key takes the write lock only for the touch.
/// - **Snapshots**: an `Arc` of the memtable map captured under the memtable
///   lock in the same critical section that applied the commit's batch.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Path of the write-ahead log
    wal_path: PathBuf,

    /// Directory for snapshot marker files
    snapshot_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Every live key (internal RwLock)
    memtable: MemTable,

    /// Limits in force for the next mutation
    limits: RwLock<Limits>,

    /// Serializes mutations
    write_lock: Mutex<()>,

    /// WAL length right after the last checkpoint
    checkpointed_len: AtomicU64,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const CHECKPOINT_FILENAME: &'static str = "wal.log.checkpoint";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create the data and snapshot directories
    /// 2. Recover from the WAL if it exists
    /// 3. Checkpoint if the recovered log is over threshold
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let snapshot_dir = config.data_dir.join(SNAPSHOT_DIR);
        fs::create_dir_all(&snapshot_dir)?;

        let memtable = MemTable::new();

        let next_lsn = if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery complete"
                );
            }

            for entry in entries {
                memtable.apply(entry.operation, Timestamp::from_millis(entry.timestamp));
            }
            recovery.last_lsn + 1
        } else {
            1
        };

        let wal = WalWriter::resume(&wal_path, config.wal_sync_strategy, next_lsn)?;
        let limits = config.limits;

        let engine = Self {
            config,
            wal_path,
            snapshot_dir,
            wal: Mutex::new(wal),
            memtable,
            limits: RwLock::new(limits),
            write_lock: Mutex::new(()),
            checkpointed_len: AtomicU64::new(0),
        };

        {
            let _write_guard = engine.write_lock.lock();
            engine.settle(&HashSet::new());
        }

        tracing::debug!(
            dir = %engine.config.data_dir.display(),
            keys = engine.memtable.entry_count(),
            "Engine opened"
        );
        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    // =========================================================================
    // Single-Key Operations
    // =========================================================================

    /// Current metadata for a key
    pub fn stat(&self, key: &[u8]) -> Option<Stat> {
        self.memtable.stat(key)
    }

    /// Store a value, replacing any previous one.
    ///
    /// Returns the number of bytes stored.
    pub fn write(&self, key: &[u8], value: &[u8]) -> Result<usize> {
        let _write_guard = self.write_lock.lock();

        let at = now_millis();
        let operation = Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.log(&operation, at)?;
        self.memtable.apply(operation, Timestamp::from_millis(at));

        self.settle(&HashSet::from([key.to_vec()]));

        Ok(value.len())
    }

    /// Copy a value's bytes from `offset` into `buf` and refresh its last-used
    /// time. Returns the number of bytes copied.
    pub fn read_at(&self, key: &[u8], buf: &mut [u8], offset: u64) -> Result<usize> {
        let record = self.memtable.get(key).ok_or(BurrowError::KeyNotFound)?;
        let n = record.read_at(buf, offset);
        if let Err(e) = self.touch(key) {
            tracing::warn!(error = %e, "Failed to refresh last-used time after read");
        }
        Ok(n)
    }

    /// Remove a key, returning its metadata at removal
    pub fn delete(&self, key: &[u8]) -> Result<Option<Stat>> {
        let _write_guard = self.write_lock.lock();

        let stat = match self.memtable.stat(key) {
            Some(stat) => stat,
            None => return Ok(None),
        };

        let at = now_millis();
        let operation = Operation::Delete { key: key.to_vec() };
        self.log(&operation, at)?;
        self.memtable.apply(operation, Timestamp::from_millis(at));
        self.settle(&HashSet::new());

        Ok(Some(stat))
    }

    /// Items whose key starts with `prefix`, in ascending key order
    pub fn list_items(&self, prefix: &[u8]) -> Vec<Item> {
        self.memtable.list_items(prefix)
    }

    /// Refresh a key's last-used time; no-op for absent keys
    fn touch(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        // Deleted between the read and the touch
        if self.memtable.stat(key).is_none() {
            return Ok(());
        }

        let at = now_millis();
        let operation = Operation::Touch { key: key.to_vec() };
        self.log(&operation, at)?;
        self.memtable.apply(operation, Timestamp::from_millis(at));
        self.settle(&HashSet::from([key.to_vec()]));
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Commit a transaction's staged keys and capture its snapshot.
    ///
    /// All staged writes and the touches for staged reads go to the WAL as a
    /// single batch entry and are applied to the memtable under one lock, so
    /// no observer sees part of a commit. Staged reads of keys that have
    /// vanished since staging are skipped.
    pub fn commit(&self, staged: Vec<StagedKey>) -> Result<Snapshot> {
        let keys: Vec<Vec<u8>> = staged.iter().map(|s| s.key.clone()).collect();
        let marker = SnapshotMarker::create(&self.snapshot_dir, &keys)?;

        let _write_guard = self.write_lock.lock();

        let mut written = HashSet::new();
        let mut operations = Vec::with_capacity(staged.len());
        for StagedKey { key, write } in staged {
            match write {
                Some(value) => {
                    written.insert(key.clone());
                    operations.push(Operation::Put { key, value });
                }
                None if written.contains(&key) || self.memtable.stat(&key).is_some() => {
                    operations.push(Operation::Touch { key });
                }
                None => {
                    tracing::debug!(
                        key = ?String::from_utf8_lossy(&key),
                        "Staged key vanished before commit"
                    );
                }
            }
        }

        let view = if operations.is_empty() {
            self.memtable.view()
        } else {
            let at = now_millis();
            let batch = Operation::Batch { operations };
            self.log(&batch, at)?;
            self.memtable.apply_and_view(batch, Timestamp::from_millis(at))
        };

        self.settle(&keys.into_iter().collect());

        Ok(Snapshot::new(view, marker))
    }

    // =========================================================================
    // Limits
    // =========================================================================

    /// Replace the instance limits; they govern the next mutation onward
    pub fn set_limits(&self, limits: Limits) {
        tracing::info!(
            max_value_length_sum = ?limits.max_value_length_sum,
            "Instance limits updated"
        );
        *self.limits.write() = limits;
    }

    /// Limits currently in force
    pub fn limits(&self) -> Limits {
        *self.limits.read()
    }

    /// Housekeeping after a mutation has been logged and applied. The
    /// mutation stands whatever happens here, so failures are only logged.
    /// Called with write lock held.
    fn settle(&self, protected: &HashSet<Vec<u8>>) {
        if let Err(e) = self.enforce_limits(protected) {
            tracing::warn!(error = %e, "Eviction failed; store stays over its limit");
        }
        if let Err(e) = self.maybe_checkpoint() {
            tracing::warn!(error = %e, "WAL checkpoint failed; keeping the current log");
        }
    }

    /// Evict least-recently-used keys until the value total fits the cap.
    /// Called with write lock held.
    fn enforce_limits(&self, protected: &HashSet<Vec<u8>>) -> Result<()> {
        let max = match self.limits.read().max_value_length_sum {
            Some(max) => max,
            None => return Ok(()),
        };
        let size = self.memtable.size();
        if size <= max {
            return Ok(());
        }

        let victims = self.memtable.eviction_candidates(size - max, protected);
        if victims.is_empty() {
            tracing::warn!(size, max, "Over value length limit with nothing evictable");
            return Ok(());
        }

        let evicted = victims.len();
        let batch = Operation::Batch {
            operations: victims
                .into_iter()
                .map(|key| Operation::Delete { key })
                .collect(),
        };
        let at = now_millis();
        self.log(&batch, at)?;
        self.memtable.apply(batch, Timestamp::from_millis(at));

        tracing::info!(
            evicted,
            size = self.memtable.size(),
            max,
            "Evicted least recently used keys"
        );
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Remove snapshot markers no live reader owns; returns how many
    pub fn cleanup_snapshots(&self) -> Result<usize> {
        snapshot::cleanup_stale(&self.snapshot_dir)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Rewrite the WAL as one entry per live key (public API)
    ///
    /// Forces a checkpoint regardless of log size
    pub fn checkpoint(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.checkpoint_internal()
    }

    /// Flush buffered WAL entries and fsync
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// Close the engine gracefully
    ///
    /// Syncs the WAL to ensure all data is on disk
    pub fn close(self) -> Result<()> {
        self.sync()?;
        tracing::debug!(dir = %self.config.data_dir.display(), "Engine closed");
        Ok(())
    }

    fn log(&self, operation: &Operation, at: u64) -> Result<u64> {
        self.wal.lock().append_at(operation, at)
    }

    /// Checkpoint once the log passes its threshold and has at least doubled
    /// since the last checkpoint. Called with write lock held.
    fn maybe_checkpoint(&self) -> Result<()> {
        let len = self.wal.lock().len();
        let floor = self.checkpointed_len.load(Ordering::Relaxed).saturating_mul(2);
        if len >= self.config.compact_threshold && len >= floor {
            self.checkpoint_internal()?;
        }
        Ok(())
    }

    /// Internal checkpoint implementation (called with write lock held)
    fn checkpoint_internal(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        let before = wal.len();

        let view = self.memtable.view();
        let temp_path = self.config.data_dir.join(Self::CHECKPOINT_FILENAME);

        // Synced once at the end rather than per entry
        let mut checkpoint = WalWriter::create(
            &temp_path,
            WalSyncStrategy::EveryNEntries { count: usize::MAX },
        )?;
        for (key, record) in view.iter() {
            let operation = Operation::Put {
                key: key.clone(),
                value: record.value.to_vec(),
            };
            checkpoint.append_at(&operation, record.last_used.as_millis())?;
        }
        checkpoint.sync()?;
        let next_lsn = checkpoint.current_lsn();
        drop(checkpoint);

        fs::rename(&temp_path, &self.wal_path)?;
        *wal = WalWriter::resume(&self.wal_path, self.config.wal_sync_strategy, next_lsn)?;
        self.checkpointed_len.store(wal.len(), Ordering::Relaxed);

        tracing::info!(before, after = wal.len(), keys = view.len(), "WAL checkpointed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the snapshot marker directory
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Get the WAL path
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Current WAL length in bytes
    pub fn wal_len(&self) -> u64 {
        self.wal.lock().len()
    }

    /// Sum of all stored value lengths
    pub fn value_length_sum(&self) -> u64 {
        self.memtable.size()
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.wal.get_mut().sync() {
            tracing::warn!(error = %e, "Failed to sync WAL on drop");
        }
    }
}
