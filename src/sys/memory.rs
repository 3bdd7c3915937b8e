use super::burrow_item_t;

/// Release key bytes handed out in a `burrow_item_t`.
#[no_mangle]
pub unsafe extern "C" fn burrow_bytes_free(data: *mut u8, len: usize) {
    if !data.is_null() && len > 0 {
        if let Ok(layout) = std::alloc::Layout::from_size_align(len, 1) {
            std::alloc::dealloc(data, layout);
        }
    }
}

/// Release an item envelope. Does not release the keys it points at.
#[no_mangle]
pub unsafe extern "C" fn burrow_items_free(items: *mut burrow_item_t, len: usize) {
    if !items.is_null() && len > 0 {
        let envelope = std::ptr::slice_from_raw_parts_mut(items, len);
        drop(Box::from_raw(envelope));
    }
}
