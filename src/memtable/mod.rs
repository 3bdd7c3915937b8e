//! MemTable Module
//!
//! In-memory index of every live key in the reference engine.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track total value bytes for instance limits
//! - Ordered prefix scans for listing
//! - Cheap point-in-time views for reader snapshots
//!
//! ## Data Structure Choice
//! `BTreeMap` inside an `Arc`, behind a `parking_lot::RwLock`:
//! - Ordered keys make prefix listing a range scan
//! - A snapshot is an `Arc` clone; the next write copies the map only while
//!   some snapshot still holds the old one (`Arc::make_mut`)
//! - Values are `Bytes`, so copying the map never copies value data

mod table;

use bytes::Bytes;

use crate::item::{Stat, Timestamp};

pub use table::{list_view, MemTable, View};

/// A live value and its last-used time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: Bytes,
    pub last_used: Timestamp,
}

impl Record {
    pub fn new(value: impl Into<Bytes>, last_used: Timestamp) -> Self {
        Self {
            value: value.into(),
            last_used,
        }
    }

    pub fn stat(&self) -> Stat {
        Stat {
            size: self.value.len() as u64,
            last_used: self.last_used,
        }
    }

    /// Copy bytes starting at `offset` into `buf`; returns the count copied
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let len = self.value.len() as u64;
        if offset >= len {
            return 0;
        }
        let start = offset as usize;
        let n = buf.len().min(self.value.len() - start);
        buf[..n].copy_from_slice(&self.value[start..start + n]);
        n
    }
}
