//! Store handle
//!
//! `Handle` owns one open engine instance for its whole lifetime. Every
//! method is a thin wrapper that pins its byte arguments for the duration of
//! one boundary call and decodes the returned status.

use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use crate::config::{Config, Limits, WalSyncStrategy};
use crate::error::{BurrowError, Result};
use crate::item::{Item, Stat};
use crate::sys;

use super::buf::{BufMut, BufRef};
use super::file_info::FileInfo;
use super::listing::ItemsEnvelope;
use super::reader::Reader;
use super::status::{self, Outcome};

/// An open store.
///
/// Safe to share across threads; the engine serializes mutations internally.
/// Closing consumes the handle, so it cannot be used afterwards:
///
/// ```compile_fail
/// use burrowkv::Handle;
///
/// fn main() -> burrowkv::Result<()> {
///     let dir = tempfile::tempdir()?;
///     let handle = Handle::open(dir.path())?;
///     handle.close()?;
///     handle.single_stat(b"key");
///     Ok(())
/// }
/// ```
pub struct Handle {
    /// `None` only once released
    raw: Option<NonNull<sys::burrow_handle_t>>,
    dir: PathBuf,
}

// SAFETY: the engine behind the handle is internally synchronized and the
// boundary functions taking a handle only read through it.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    /// Open (or create) the store rooted at `dir` with default settings
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().data_dir(dir.as_ref()).build();
        Self::open_with(&config)
    }

    /// Open (or create) a store with explicit settings
    pub fn open_with(config: &Config) -> Result<Self> {
        let dir = config.data_dir.to_str().ok_or_else(|| {
            BurrowError::Config(format!("data_dir is not valid UTF-8: {:?}", config.data_dir))
        })?;
        let dir_buf = BufRef::new(dir.as_bytes());

        let sync_every_n = match config.wal_sync_strategy {
            WalSyncStrategy::EveryWrite => 0,
            WalSyncStrategy::EveryNEntries { count } => count as u64,
        };
        let raw_config = sys::burrow_config_t {
            data_dir: dir_buf.raw(),
            sync_every_n,
            compact_threshold: config.compact_threshold,
            limits: config.limits.into(),
        };

        let mut out = ptr::null_mut();
        let code = unsafe { sys::burrow_open(&raw_config, &mut out) };
        if code != sys::BURROW_OK {
            tracing::error!(
                dir = %config.data_dir.display(),
                code,
                status = status::status_name(code),
                "Failed to open store"
            );
            return Err(BurrowError::Open {
                path: config.data_dir.clone(),
                status: code,
            });
        }
        let raw = match NonNull::new(out) {
            Some(raw) => raw,
            None => status::contract_violation("open succeeded without a handle"),
        };

        tracing::debug!(dir = %config.data_dir.display(), "Opened store");
        Ok(Self {
            raw: Some(raw),
            dir: config.data_dir.clone(),
        })
    }

    /// Directory the store lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Close the store, flushing the log.
    ///
    /// Dropping a handle closes it too, logging rather than returning any
    /// failure.
    pub fn close(mut self) -> Result<()> {
        status::check(self.release())
    }

    // =========================================================================
    // Single-Key Operations
    // =========================================================================

    /// Current metadata for `key`, or `None` if it does not exist
    pub fn single_stat(&self, key: &[u8]) -> Option<Stat> {
        let key = BufRef::new(key);
        let mut out = sys::burrow_stat_t::default();
        let code = unsafe { sys::burrow_single_stat(self.raw(), key.raw(), &mut out) };
        match status::decode(code) {
            Outcome::Success => Some(out.into()),
            Outcome::NoSuchKey => None,
        }
    }

    /// `single_stat` as a filesystem-style record
    pub fn single_file_info(&self, key: &[u8]) -> Option<FileInfo> {
        self.single_stat(key).map(|stat| FileInfo::new(key, stat))
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Returns the number of bytes written, which is always `value.len()`;
    /// the engine reporting any other count is an error.
    pub fn single_write(&self, key: &[u8], value: &[u8]) -> Result<usize> {
        let (key_buf, value_buf) = (BufRef::new(key), BufRef::new(value));
        let written =
            unsafe { sys::burrow_single_write_buf(self.raw(), key_buf.raw(), value_buf.raw()) };
        status::check_written(value.len(), written)
    }

    /// Read part of a value into `buf` starting at byte `offset`.
    ///
    /// Returns the number of bytes read. A non-empty `buf` that receives no
    /// bytes yields `EndOfData`; a missing key yields `KeyNotFound`.
    pub fn single_read_at(&self, key: &[u8], buf: &mut [u8], offset: u64) -> Result<usize> {
        let key = BufRef::new(key);
        let requested = buf.len();
        let mut desc = BufMut::new(buf);
        let code =
            unsafe { sys::burrow_single_readat(self.raw(), key.raw(), desc.as_raw(), offset) };
        status::check(code)?;
        status::end_of_data(requested, desc.filled())
    }

    /// Remove `key`. Returns its metadata at removal, or `None` if it did not
    /// exist.
    pub fn single_delete(&self, key: &[u8]) -> Result<Option<Stat>> {
        let key = BufRef::new(key);
        let mut out = sys::burrow_stat_t::default();
        let code = unsafe { sys::burrow_single_delete(self.raw(), key.raw(), &mut out) };
        match status::decode(code) {
            Outcome::Success => Ok(Some(out.into())),
            Outcome::NoSuchKey => Ok(None),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Every item whose key starts with `prefix`.
    ///
    /// Items currently come back in ascending key order, but callers should
    /// not rely on it.
    pub fn list_items(&self, prefix: &[u8]) -> Result<Vec<Item>> {
        let prefix = BufRef::new(prefix);
        let mut envelope = ItemsEnvelope::new();
        let code = unsafe {
            sys::burrow_list_items(
                self.raw(),
                prefix.raw(),
                envelope.items_out(),
                envelope.len_out(),
            )
        };
        status::check(code)?;
        Ok(envelope.into_items())
    }

    /// Keys starting with `prefix`
    pub fn list_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .list_items(prefix)?
            .into_iter()
            .map(|item| item.key)
            .collect())
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Start a reader transaction
    pub fn new_reader(&self) -> Result<Reader<'_>> {
        let mut out = ptr::null_mut();
        status::check(unsafe { sys::burrow_reader_new(self.raw(), &mut out) })?;
        match NonNull::new(out) {
            Some(raw) => Ok(Reader::from_raw(raw)),
            None => status::contract_violation("reader created without a handle"),
        }
    }

    // =========================================================================
    // Instance Management
    // =========================================================================

    /// Replace the instance limits. They govern operations issued after this
    /// returns; nothing is evicted by the call itself.
    pub fn set_instance_limits(&self, limits: &Limits) -> Result<()> {
        let raw: sys::burrow_limits_t = (*limits).into();
        status::check(unsafe { sys::burrow_set_instance_limits(self.raw(), &raw) })
    }

    /// Remove snapshot state left behind by readers that were never ended
    /// (for example after a crash). Returns the number of snapshots removed.
    pub fn cleanup_snapshots(&self) -> Result<usize> {
        let mut removed = 0usize;
        status::check(unsafe { sys::burrow_cleanup_snapshots(self.raw(), &mut removed) })?;
        Ok(removed)
    }

    fn raw(&self) -> *mut sys::burrow_handle_t {
        match self.raw {
            Some(raw) => raw.as_ptr(),
            None => status::contract_violation("handle used after close"),
        }
    }

    fn release(&mut self) -> sys::burrow_status_t {
        match self.raw.take() {
            Some(raw) => {
                tracing::debug!(dir = %self.dir.display(), "Closing store");
                unsafe { sys::burrow_close(raw.as_ptr()) }
            }
            None => sys::BURROW_OK,
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let code = self.release();
        if code != sys::BURROW_OK {
            tracing::warn!(
                dir = %self.dir.display(),
                code,
                status = status::status_name(code),
                "Failed to close store on drop"
            );
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("dir", &self.dir)
            .field("open", &self.raw.is_some())
            .finish()
    }
}
