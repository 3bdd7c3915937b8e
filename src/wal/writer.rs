//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{BurrowError, Result};
use crate::item::now_millis;

use super::entry::encode_frame;
use super::{Operation, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    /// Path of the log (kept for truncation and diagnostics)
    path: PathBuf,

    /// Buffered append handle
    file: BufWriter<File>,

    /// LSN the next append will receive
    next_lsn: u64,

    /// How often to fsync
    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last sync
    uncommitted: usize,

    /// Current length of the log in bytes
    len: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Existing entries are scanned so numbering continues after the last
    /// valid LSN.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn + 1
        } else {
            1
        };
        Self::resume(path, sync_strategy, next_lsn)
    }

    /// Open for appending with a known next LSN (the caller already replayed the log)
    pub fn resume(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            next_lsn,
            sync_strategy,
            uncommitted: 0,
            len,
        })
    }

    /// Create an empty WAL, replacing any file at `path`
    pub fn create(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        File::create(path)?;
        Self::resume(path, sync_strategy, 1)
    }

    /// Append an operation stamped with the current time.
    ///
    /// Returns the LSN assigned to the entry.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.append_at(&operation, now_millis())
    }

    /// Append an operation with an explicit timestamp
    pub fn append_at(&mut self, operation: &Operation, timestamp: u64) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, operation, timestamp)?;

        self.file
            .write_all(&frame)
            .map_err(|e| BurrowError::WalWrite(format!("append LSN {}: {}", lsn, e)))?;

        self.next_lsn += 1;
        self.len += frame.len() as u64;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry and restart numbering at 1
    pub fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        let file = self.file.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        self.next_lsn = 1;
        self.uncommitted = 0;
        self.len = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last sync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Log length in bytes, including buffered frames
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
