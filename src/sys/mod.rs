//! Handle-based boundary to the storage engine.
//!
//! Every engine object crosses this boundary as an opaque pointer, and every
//! result as a status code. The client layer in `crate::client` is the only
//! intended caller; the functions are also exported from the cdylib.
//!
//! # Safety
//!
//! All `extern "C"` functions here follow the same safety contract: pointer
//! arguments must be valid (properly aligned, and non-null where required)
//! for the duration of the call, and out-pointers must point to writable
//! memory. Each function validates its inputs and returns
//! `BURROW_INVALID_INPUT` on null pointers rather than invoking undefined
//! behavior. Byte descriptors are only read during the call that receives
//! them; the engine never retains one.
//!
//! # Ownership
//!
//! | Object              | Created by              | Released by            |
//! |---------------------|-------------------------|------------------------|
//! | `burrow_handle_t`   | `burrow_open`           | `burrow_close`         |
//! | `burrow_reader_t`   | `burrow_reader_new`     | `burrow_reader_end`    |
//! | `burrow_value_t`    | `burrow_reader_add/put` | its reader's end       |
//! | item envelope       | `*_list_items`          | `burrow_items_free`    |
//! | item key bytes      | `*_list_items`          | `burrow_bytes_free`    |
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

mod handle;
mod memory;
mod reader;
mod value;

use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::config::{Config, Limits, WalSyncStrategy};
use crate::engine::Engine;
use crate::error::BurrowError;
use crate::item::{Item, Stat, Timestamp};
use crate::memtable::Record;
use crate::transaction::Transaction;

pub use handle::*;
pub use memory::*;
pub use reader::*;
pub use value::*;

// =============================================================================
// Status Codes
// =============================================================================

pub type burrow_status_t = u32;

pub const BURROW_OK: burrow_status_t = 0;
pub const BURROW_NO_SUCH_KEY: burrow_status_t = 1;
pub const BURROW_IO_ERROR: burrow_status_t = 2;
pub const BURROW_INVALID_INPUT: burrow_status_t = 3;
pub const BURROW_INTERNAL: burrow_status_t = 4;

/// Returned by `burrow_single_write_buf` in place of a byte count on failure
pub const BURROW_WRITE_FAILED: usize = usize::MAX;

/// `burrow_limits_t` field value meaning "no cap"
pub const BURROW_NO_LIMIT: u64 = u64::MAX;

// =============================================================================
// Opaque Objects
// =============================================================================

pub struct burrow_handle_t {
    pub(crate) engine: Arc<Engine>,
}

pub struct burrow_reader_t {
    pub(crate) txn: Transaction,
    /// Owned value handles; addresses stay fixed until the reader is freed
    pub(crate) values: Vec<NonNull<burrow_value_t>>,
}

pub struct burrow_value_t {
    pub(crate) key: Vec<u8>,
    /// Filled in when the owning reader commits
    pub(crate) record: Option<Record>,
    pub(crate) committed: bool,
}

impl Drop for burrow_reader_t {
    fn drop(&mut self) {
        for value in self.values.drain(..) {
            // SAFETY: leaked from a Box in reader_stage and owned
            // exclusively by this reader.
            unsafe { drop(Box::from_raw(value.as_ptr())) };
        }
    }
}

// =============================================================================
// Plain Data
// =============================================================================

/// Borrowed, read-only bytes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct burrow_buf_t {
    pub ptr: *const u8,
    pub size: usize,
}

/// Borrowed, writable bytes. `size` is the capacity on entry and the count
/// filled on return.
#[repr(C)]
#[derive(Debug)]
pub struct burrow_mut_buf_t {
    pub ptr: *mut u8,
    pub size: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct burrow_timestamp_t {
    pub secs: i64,
    pub nanos: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct burrow_stat_t {
    pub last_used: burrow_timestamp_t,
    pub size: u64,
}

/// One listed key; `key` is an engine allocation released with
/// `burrow_bytes_free`
#[repr(C)]
#[derive(Debug)]
pub struct burrow_item_t {
    pub key: burrow_mut_buf_t,
    pub stat: burrow_stat_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct burrow_limits_t {
    pub max_value_length_sum: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct burrow_config_t {
    /// UTF-8 path
    pub data_dir: burrow_buf_t,
    /// fsync after this many WAL entries; 0 means after every entry
    pub sync_every_n: u64,
    pub compact_threshold: u64,
    pub limits: burrow_limits_t,
}

impl From<Stat> for burrow_stat_t {
    fn from(stat: Stat) -> Self {
        Self {
            last_used: burrow_timestamp_t {
                secs: stat.last_used.secs,
                nanos: stat.last_used.nanos,
            },
            size: stat.size,
        }
    }
}

impl From<burrow_stat_t> for Stat {
    fn from(raw: burrow_stat_t) -> Self {
        Self {
            size: raw.size,
            last_used: Timestamp {
                secs: raw.last_used.secs,
                nanos: raw.last_used.nanos,
            },
        }
    }
}

impl From<Limits> for burrow_limits_t {
    fn from(limits: Limits) -> Self {
        Self {
            max_value_length_sum: limits.max_value_length_sum.unwrap_or(BURROW_NO_LIMIT),
        }
    }
}

impl From<burrow_limits_t> for Limits {
    fn from(raw: burrow_limits_t) -> Self {
        Self {
            max_value_length_sum: match raw.max_value_length_sum {
                BURROW_NO_LIMIT => None,
                max => Some(max),
            },
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Fold an engine error into its status code
pub(crate) fn status_from_error(err: &BurrowError) -> burrow_status_t {
    let status = match err {
        BurrowError::KeyNotFound => return BURROW_NO_SUCH_KEY,
        BurrowError::Io(_) | BurrowError::WalWrite(_) => BURROW_IO_ERROR,
        BurrowError::Config(_) | BurrowError::ReaderState { .. } => BURROW_INVALID_INPUT,
        _ => BURROW_INTERNAL,
    };
    tracing::error!(status, error = %err, "Engine operation failed");
    status
}

pub(crate) fn invalid_input(message: &str) -> burrow_status_t {
    tracing::error!(%message, "Rejected boundary call");
    BURROW_INVALID_INPUT
}

pub(crate) fn require_handle<T>(ptr: *const T, name: &str) -> Result<(), burrow_status_t> {
    if ptr.is_null() {
        Err(invalid_input(&format!("{name} must not be null")))
    } else {
        Ok(())
    }
}

pub(crate) fn require_out_ptr<T>(ptr: *mut T, name: &str) -> Result<(), burrow_status_t> {
    require_handle(ptr as *const T, name)
}

pub(crate) unsafe fn bytes_from_buf<'a>(
    buf: burrow_buf_t,
    name: &str,
) -> Result<&'a [u8], burrow_status_t> {
    if buf.ptr.is_null() && buf.size > 0 {
        Err(invalid_input(&format!("{name} must not be null when size > 0")))
    } else if buf.ptr.is_null() || buf.size == 0 {
        Ok(&[])
    } else {
        Ok(std::slice::from_raw_parts(buf.ptr, buf.size))
    }
}

pub(crate) unsafe fn bytes_from_mut_ptr<'a>(
    ptr: *mut u8,
    len: usize,
    name: &str,
) -> Result<&'a mut [u8], burrow_status_t> {
    if ptr.is_null() && len > 0 {
        Err(invalid_input(&format!("{name} must not be null when size > 0")))
    } else if ptr.is_null() || len == 0 {
        Ok(&mut [])
    } else {
        Ok(std::slice::from_raw_parts_mut(ptr, len))
    }
}

pub(crate) unsafe fn build_config(raw: &burrow_config_t) -> Result<Config, burrow_status_t> {
    let dir = bytes_from_buf(raw.data_dir, "data_dir")?;
    if dir.is_empty() {
        return Err(invalid_input("data_dir must not be empty"));
    }
    let dir = std::str::from_utf8(dir)
        .map_err(|e| invalid_input(&format!("data_dir is not valid UTF-8: {e}")))?;

    let wal_sync_strategy = match raw.sync_every_n {
        0 => WalSyncStrategy::EveryWrite,
        n => WalSyncStrategy::EveryNEntries {
            count: usize::try_from(n).unwrap_or(usize::MAX),
        },
    };

    Ok(Config {
        data_dir: PathBuf::from(dir),
        wal_sync_strategy,
        compact_threshold: raw.compact_threshold,
        limits: raw.limits.into(),
    })
}

pub(crate) fn alloc_bytes(data: &[u8]) -> (*mut u8, usize) {
    let len = data.len();
    if len == 0 {
        return (std::ptr::null_mut(), 0);
    }
    let layout = match std::alloc::Layout::from_size_align(len, 1) {
        Ok(layout) => layout,
        Err(_) => return (std::ptr::null_mut(), 0),
    };
    unsafe {
        let ptr = std::alloc::alloc(layout);
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, len);
        (ptr, len)
    }
}

/// Hand a listing to the caller as an engine-owned envelope plus per-key
/// allocations
pub(crate) unsafe fn export_items(
    items: Vec<Item>,
    out_items: *mut *mut burrow_item_t,
    out_len: *mut usize,
) {
    let exported: Box<[burrow_item_t]> = items
        .into_iter()
        .map(|item| {
            let (ptr, size) = alloc_bytes(&item.key);
            burrow_item_t {
                key: burrow_mut_buf_t { ptr, size },
                stat: item.stat.into(),
            }
        })
        .collect();

    *out_len = exported.len();
    *out_items = if exported.is_empty() {
        std::ptr::null_mut()
    } else {
        Box::into_raw(exported) as *mut burrow_item_t
    };
}
