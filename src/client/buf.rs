//! Byte descriptors handed across the boundary
//!
//! A descriptor is a raw (pointer, length) pair tied by lifetime to the
//! slice it was built from, so the slice cannot move or be freed while the
//! descriptor exists. Descriptors are built on the stack right before a
//! boundary call and dropped right after; they are neither `Copy` nor `Send`.

use std::marker::PhantomData;

use crate::sys::{burrow_buf_t, burrow_mut_buf_t};

use super::status;

/// Read-only descriptor over a caller slice
pub(crate) struct BufRef<'a> {
    raw: burrow_buf_t,
    _borrow: PhantomData<&'a [u8]>,
}

impl<'a> BufRef<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            raw: burrow_buf_t {
                ptr: bytes.as_ptr(),
                size: bytes.len(),
            },
            _borrow: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> burrow_buf_t {
        self.raw
    }
}

/// Writable descriptor over a caller slice; the engine reports the count it
/// filled through `size`
pub(crate) struct BufMut<'a> {
    raw: burrow_mut_buf_t,
    capacity: usize,
    _borrow: PhantomData<&'a mut [u8]>,
}

impl<'a> BufMut<'a> {
    pub(crate) fn new(bytes: &'a mut [u8]) -> Self {
        let capacity = bytes.len();
        Self {
            raw: burrow_mut_buf_t {
                ptr: bytes.as_mut_ptr(),
                size: capacity,
            },
            capacity,
            _borrow: PhantomData,
        }
    }

    pub(crate) fn as_raw(&mut self) -> *mut burrow_mut_buf_t {
        &mut self.raw
    }

    /// Bytes the engine reported filling
    pub(crate) fn filled(&self) -> usize {
        if self.raw.size > self.capacity {
            status::contract_violation("read reported more bytes than the buffer holds");
        }
        self.raw.size
    }
}
