//! # BurrowKV
//!
//! The client access layer of an embedded, persistent key-value store:
//! - Single-key stat/write/read-at/delete
//! - Prefix listing
//! - Reader transactions that commit staged writes atomically and read from a
//!   snapshot taken at the commit point
//! - Instance limits with least-recently-used eviction
//! - Cleanup of snapshots left behind by crashed readers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    client (safe API)                         │
//! │        Handle ── Reader<'h> ── Value<'r> ── FileInfo         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  byte descriptors in, status codes out
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 sys (extern "C" boundary)                    │
//! │          opaque handles · engine-owned allocations           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────┐
//!          │            │             │
//!          ▼            ▼             ▼
//!   ┌─────────────┐ ┌──────────┐ ┌─────────────┐
//!   │     WAL     │ │ MemTable │ │  Snapshots  │
//!   │  (Append)   │ │ (RwLock) │ │  (markers)  │
//!   └─────────────┘ └──────────┘ └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use burrowkv::Handle;
//!
//! fn main() -> burrowkv::Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let handle = Handle::open(dir.path())?;
//!
//!     handle.single_write(b"users/alice", b"admin")?;
//!     assert_eq!(handle.single_stat(b"users/alice").map(|s| s.size()), Some(5));
//!
//!     let mut buf = [0u8; 5];
//!     assert_eq!(handle.single_read_at(b"users/alice", &mut buf, 0)?, 5);
//!     assert_eq!(&buf, b"admin");
//!
//!     assert_eq!(handle.list_keys(b"users/")?, vec![b"users/alice".to_vec()]);
//!
//!     handle.close()
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod item;

pub mod wal;
pub mod memtable;
pub mod snapshot;
pub mod transaction;
pub mod engine;

pub mod sys;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BurrowError, Result};
pub use config::{Config, Limits, WalSyncStrategy};
pub use item::{Item, Stat, Timestamp};
pub use client::{FileInfo, Handle, Reader, ReaderState, Value, ValueCursor};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BurrowKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
