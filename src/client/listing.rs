//! Listing envelope
//!
//! A listing arrives as an engine-owned array of items, each pointing at
//! engine-owned key bytes. `ItemsEnvelope` copies everything out into
//! caller-owned `Item`s and releases the engine memory exactly once, on drop,
//! whether or not the copy completed.

use std::ptr;
use std::slice;

use crate::item::Item;
use crate::sys::{self, burrow_item_t};

pub(crate) struct ItemsEnvelope {
    items: *mut burrow_item_t,
    len: usize,
}

impl ItemsEnvelope {
    pub(crate) fn new() -> Self {
        Self {
            items: ptr::null_mut(),
            len: 0,
        }
    }

    pub(crate) fn items_out(&mut self) -> *mut *mut burrow_item_t {
        &mut self.items
    }

    pub(crate) fn len_out(&mut self) -> *mut usize {
        &mut self.len
    }

    /// Copy every key and stat into caller-owned items
    pub(crate) fn into_items(self) -> Vec<Item> {
        self.raw_items()
            .iter()
            .map(|raw| {
                // SAFETY: the engine hands out `size` initialized bytes at
                // `ptr`, valid until released in drop.
                let key = if raw.key.ptr.is_null() || raw.key.size == 0 {
                    Vec::new()
                } else {
                    unsafe { slice::from_raw_parts(raw.key.ptr, raw.key.size) }.to_vec()
                };
                Item {
                    key,
                    stat: raw.stat.into(),
                }
            })
            .collect()
    }

    fn raw_items(&self) -> &[burrow_item_t] {
        if self.items.is_null() || self.len == 0 {
            return &[];
        }
        // SAFETY: the engine filled `len` contiguous items at `items`.
        unsafe { slice::from_raw_parts(self.items, self.len) }
    }
}

impl Drop for ItemsEnvelope {
    fn drop(&mut self) {
        if self.items.is_null() {
            return;
        }
        for raw in self.raw_items() {
            // SAFETY: each key was allocated by the engine for this listing
            // and is released here once.
            unsafe { sys::burrow_bytes_free(raw.key.ptr, raw.key.size) };
        }
        // SAFETY: the envelope itself, released once; keys were freed above.
        unsafe { sys::burrow_items_free(self.items, self.len) };
        self.items = ptr::null_mut();
        self.len = 0;
    }
}
