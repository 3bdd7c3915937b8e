//! Values staged in a reader

use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::ptr::NonNull;

use crate::error::{BurrowError, Result};
use crate::item::Stat;
use crate::sys;
use crate::transaction::ReaderState;

use super::buf::BufMut;
use super::file_info::FileInfo;
use super::status::{self, Outcome};

/// A key staged in a `Reader`, readable once the reader has begun.
///
/// Borrows its reader; the engine keeps the underlying value handle alive
/// until the reader ends.
pub struct Value<'r> {
    raw: NonNull<sys::burrow_value_t>,
    key: Vec<u8>,
    state: &'r Cell<ReaderState>,
}

impl<'r> Value<'r> {
    pub(crate) fn new(
        raw: NonNull<sys::burrow_value_t>,
        key: Vec<u8>,
        state: &'r Cell<ReaderState>,
    ) -> Self {
        Self { raw, key, state }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Read part of the value as of the reader's commit point into `buf`,
    /// starting at byte `offset`.
    ///
    /// Returns the number of bytes read. A non-empty `buf` that receives no
    /// bytes yields `EndOfData`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.require_committed()?;

        let requested = buf.len();
        let mut desc = BufMut::new(buf);
        let code = unsafe { sys::burrow_value_read_at(self.raw.as_ptr(), desc.as_raw(), offset) };
        status::check(code)?;
        status::end_of_data(requested, desc.filled())
    }

    /// Metadata as of the reader's commit point
    pub fn stat(&self) -> Result<Stat> {
        self.require_committed()?;

        let mut out = sys::burrow_stat_t::default();
        match status::decode(unsafe { sys::burrow_value_stat(self.raw.as_ptr(), &mut out) }) {
            Outcome::Success => Ok(out.into()),
            Outcome::NoSuchKey => Err(BurrowError::KeyNotFound),
        }
    }

    pub fn file_info(&self) -> Result<FileInfo> {
        Ok(FileInfo::new(self.key.clone(), self.stat()?))
    }

    /// Sequential reader over the value, starting at byte 0
    pub fn cursor(&self) -> ValueCursor<'_, 'r> {
        ValueCursor {
            value: self,
            position: 0,
        }
    }

    fn require_committed(&self) -> Result<()> {
        let actual = self.state.get();
        if actual == ReaderState::Committed {
            Ok(())
        } else {
            Err(BurrowError::ReaderState {
                expected: ReaderState::Committed,
                actual,
            })
        }
    }
}

impl std::fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("state", &self.state.get())
            .finish()
    }
}

/// `io::Read` + `io::Seek` over a committed `Value`
pub struct ValueCursor<'v, 'r> {
    value: &'v Value<'r>,
    position: u64,
}

impl ValueCursor<'_, '_> {
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Read for ValueCursor<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.value.read_at(buf, self.position) {
            Ok(n) => {
                self.position += n as u64;
                Ok(n)
            }
            Err(BurrowError::EndOfData) => Ok(0),
            Err(e) => Err(into_io_error(e)),
        }
    }
}

impl Seek for ValueCursor<'_, '_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.value.stat().map_err(into_io_error)?.size, delta),
        };
        match base.checked_add_signed(delta) {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

fn into_io_error(err: BurrowError) -> io::Error {
    match err {
        BurrowError::Io(e) => e,
        BurrowError::KeyNotFound => io::Error::new(io::ErrorKind::NotFound, err),
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
