//! Reader transactions
//!
//! A `Reader` stages keys to read (`add`) and values to write (`put`), then
//! commits them all at once with `begin`. Staged writes become visible to
//! every other observer together; reads through the returned `Value`s see the
//! store as of the commit point, however it changes afterwards.
//!
//! ```
//! use burrowkv::Handle;
//!
//! fn main() -> burrowkv::Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let handle = Handle::open(dir.path())?;
//!     handle.single_write(b"config", b"v1")?;
//!
//!     let reader = handle.new_reader()?;
//!     let config = reader.add(b"config")?;
//!     let log = reader.put(b"log/1", b"started")?;
//!     reader.begin()?;
//!
//!     handle.single_write(b"config", b"v2")?;
//!
//!     let mut buf = [0u8; 2];
//!     config.read_at(&mut buf, 0)?;
//!     assert_eq!(&buf, b"v1");
//!     assert_eq!(log.stat()?.size(), 7);
//!
//!     reader.end()?;
//!     Ok(())
//! }
//! ```
//!
//! Values borrow their reader, so none can be used once it has ended:
//!
//! ```compile_fail
//! use burrowkv::Handle;
//!
//! fn main() -> burrowkv::Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let handle = Handle::open(dir.path())?;
//!     let reader = handle.new_reader()?;
//!     let value = reader.put(b"k", b"v")?;
//!     reader.begin()?;
//!     reader.end()?;
//!     let mut buf = [0u8; 1];
//!     value.read_at(&mut buf, 0)?;
//!     Ok(())
//! }
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::error::{BurrowError, Result};
use crate::item::Item;
use crate::sys;
use crate::transaction::ReaderState;

use super::buf::BufRef;
use super::handle::Handle;
use super::listing::ItemsEnvelope;
use super::status;
use super::value::Value;

/// A reader transaction on an open `Handle`
pub struct Reader<'h> {
    raw: NonNull<sys::burrow_reader_t>,
    state: Cell<ReaderState>,
    _handle: PhantomData<&'h Handle>,
}

impl<'h> Reader<'h> {
    pub(crate) fn from_raw(raw: NonNull<sys::burrow_reader_t>) -> Self {
        Self {
            raw,
            state: Cell::new(ReaderState::Created),
            _handle: PhantomData,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state.get()
    }

    /// Stage an existing key for reading.
    ///
    /// Fails with `KeyNotFound` if the key neither exists nor was staged for
    /// writing by this reader. Only permitted before `begin`.
    pub fn add(&self, key: &[u8]) -> Result<Value<'_>> {
        self.require_pre_commit()?;

        let key_buf = BufRef::new(key);
        let mut out = ptr::null();
        let code = unsafe { sys::burrow_reader_add(self.raw.as_ptr(), key_buf.raw(), &mut out) };
        status::check(code)?;

        self.state.set(ReaderState::Staging);
        Ok(self.value(out, key))
    }

    /// Stage a write of `value` under `key`. It becomes visible, together
    /// with every other staged write, when the reader begins. Only permitted
    /// before `begin`.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<Value<'_>> {
        self.require_pre_commit()?;

        let (key_buf, value_buf) = (BufRef::new(key), BufRef::new(value));
        let mut out = ptr::null();
        let code = unsafe {
            sys::burrow_reader_put(self.raw.as_ptr(), key_buf.raw(), value_buf.raw(), &mut out)
        };
        status::check(code)?;

        self.state.set(ReaderState::Staging);
        Ok(self.value(out, key))
    }

    /// Commit staged keys. Afterwards values are readable and nothing more
    /// can be staged. A reader with nothing staged may begin too.
    pub fn begin(&self) -> Result<()> {
        self.require_pre_commit()?;
        status::check(unsafe { sys::burrow_reader_begin(self.raw.as_ptr()) })?;
        self.state.set(ReaderState::Committed);
        tracing::debug!("Reader committed");
        Ok(())
    }

    /// Items in this reader's snapshot whose key starts with `prefix`.
    /// Only permitted after `begin`.
    pub fn list_items(&self, prefix: &[u8]) -> Result<Vec<Item>> {
        let actual = self.state.get();
        if actual != ReaderState::Committed {
            return Err(BurrowError::ReaderState {
                expected: ReaderState::Committed,
                actual,
            });
        }

        let prefix = BufRef::new(prefix);
        let mut envelope = ItemsEnvelope::new();
        let code = unsafe {
            sys::burrow_reader_list_items(
                self.raw.as_ptr(),
                prefix.raw(),
                envelope.items_out(),
                envelope.len_out(),
            )
        };
        status::check(code)?;
        Ok(envelope.into_items())
    }

    /// Release the reader and its snapshot.
    ///
    /// Dropping a reader ends it too, logging rather than returning any
    /// failure.
    pub fn end(mut self) -> Result<()> {
        status::check(self.release())
    }

    fn value(&self, raw: *const sys::burrow_value_t, key: &[u8]) -> Value<'_> {
        match NonNull::new(raw as *mut sys::burrow_value_t) {
            Some(raw) => Value::new(raw, key.to_vec(), &self.state),
            None => status::contract_violation("staged a key without a value handle"),
        }
    }

    fn require_pre_commit(&self) -> Result<()> {
        let actual = self.state.get();
        if actual.is_pre_commit() {
            Ok(())
        } else {
            Err(BurrowError::ReaderState {
                expected: ReaderState::Staging,
                actual,
            })
        }
    }

    fn release(&mut self) -> sys::burrow_status_t {
        if self.state.get() == ReaderState::Ended {
            return sys::BURROW_OK;
        }
        self.state.set(ReaderState::Ended);
        unsafe { sys::burrow_reader_end(self.raw.as_ptr()) }
    }
}

impl Drop for Reader<'_> {
    fn drop(&mut self) {
        let code = self.release();
        if code != sys::BURROW_OK {
            tracing::warn!(
                code,
                status = status::status_name(code),
                "Failed to end reader on drop"
            );
        }
    }
}

impl std::fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader").field("state", &self.state.get()).finish()
    }
}
