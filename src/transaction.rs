//! Reader Transactions (engine side)
//!
//! A transaction stages keys to read and values to write, then commits them
//! all at once in `begin`. After the commit it serves reads from the snapshot
//! taken at the commit point until it is ended.
//!
//! ## State Machine
//! ```text
//!   Created ──add/put──► Staging ──begin──► Committed ──end──► Ended
//!      │                                                        ▲
//!      └───────────────────────begin / end──────────────────────┘
//! ```
//! `begin` straight from `Created` commits an empty transaction.

use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{BurrowError, Result};
use crate::item::Item;
use crate::snapshot::Snapshot;

/// Lifecycle stage of a reader transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    /// Nothing staged yet
    Created,
    /// At least one key staged; more may follow
    Staging,
    /// Staged writes are committed and values are readable
    Committed,
    /// Released; nothing further is permitted
    Ended,
}

impl ReaderState {
    /// Staging operations (add/put/begin) are permitted
    pub fn is_pre_commit(self) -> bool {
        matches!(self, ReaderState::Created | ReaderState::Staging)
    }
}

/// A key staged in a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedKey {
    pub key: Vec<u8>,
    /// `Some` for a staged write, `None` for a staged read
    pub write: Option<Vec<u8>>,
}

/// Engine-side reader transaction
pub struct Transaction {
    engine: Arc<Engine>,
    staged: Vec<StagedKey>,
    snapshot: Option<Snapshot>,
    state: ReaderState,
}

impl Transaction {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            staged: Vec::new(),
            snapshot: None,
            state: ReaderState::Created,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Stage an existing key for reading.
    ///
    /// Fails with `KeyNotFound` unless the key exists or this transaction
    /// already staged a write to it.
    pub fn add(&mut self, key: &[u8]) -> Result<()> {
        self.require_pre_commit()?;

        let staged_write = self
            .staged
            .iter()
            .any(|s| s.key == key && s.write.is_some());
        if !staged_write && self.engine.stat(key).is_none() {
            return Err(BurrowError::KeyNotFound);
        }

        self.staged.push(StagedKey {
            key: key.to_vec(),
            write: None,
        });
        self.state = ReaderState::Staging;
        Ok(())
    }

    /// Stage a write; it becomes visible when the transaction commits
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.require_pre_commit()?;

        self.staged.push(StagedKey {
            key: key.to_vec(),
            write: Some(value.to_vec()),
        });
        self.state = ReaderState::Staging;
        Ok(())
    }

    /// Commit every staged key and take the snapshot reads are served from
    pub fn begin(&mut self) -> Result<&Snapshot> {
        self.require_pre_commit()?;

        let staged = std::mem::take(&mut self.staged);
        let snapshot = self.engine.commit(staged)?;
        self.state = ReaderState::Committed;
        Ok(self.snapshot.insert(snapshot))
    }

    /// The committed snapshot, once `begin` has succeeded
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Items visible at the commit point whose key starts with `prefix`
    pub fn list_items(&self, prefix: &[u8]) -> Result<Vec<Item>> {
        match &self.snapshot {
            Some(snapshot) => Ok(snapshot.list_items(prefix)),
            None => Err(BurrowError::ReaderState {
                expected: ReaderState::Committed,
                actual: self.state,
            }),
        }
    }

    /// Release the snapshot. Permitted from any state but `Ended`.
    pub fn end(&mut self) -> Result<()> {
        if self.state == ReaderState::Ended {
            return Err(BurrowError::ReaderState {
                expected: ReaderState::Committed,
                actual: ReaderState::Ended,
            });
        }
        self.snapshot = None;
        self.staged.clear();
        self.state = ReaderState::Ended;
        Ok(())
    }

    fn require_pre_commit(&self) -> Result<()> {
        if self.state.is_pre_commit() {
            Ok(())
        } else {
            Err(BurrowError::ReaderState {
                expected: ReaderState::Staging,
                actual: self.state,
            })
        }
    }
}
